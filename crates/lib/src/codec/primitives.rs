//! Null, booleans, numbers, strings and byte blobs.

use crate::context::{ReadContext, WriteContext};
use crate::error::CacheError;

use super::{CodecFamily, EncodeError, Value, tags};

/// Built-in scalar values.
pub struct PrimitiveCodecs;

impl CodecFamily for PrimitiveCodecs {
  fn name(&self) -> &'static str {
    "primitives"
  }

  fn tags(&self) -> &'static [u8] {
    &[
      tags::NULL,
      tags::TRUE,
      tags::FALSE,
      tags::INT,
      tags::FLOAT,
      tags::STRING,
      tags::BYTES,
    ]
  }

  fn claims(&self, value: &Value) -> bool {
    matches!(
      value,
      Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) | Value::Bytes(_)
    )
  }

  fn encode(&self, ctx: &mut WriteContext<'_>, value: &Value) -> Result<(), EncodeError> {
    let encoder = ctx.encoder();
    match value {
      Value::Null => encoder.write_u8(tags::NULL)?,
      Value::Bool(true) => encoder.write_u8(tags::TRUE)?,
      Value::Bool(false) => encoder.write_u8(tags::FALSE)?,
      Value::Int(n) => {
        encoder.write_u8(tags::INT)?;
        encoder.write_var_i64(*n)?;
      }
      Value::Float(n) => {
        encoder.write_u8(tags::FLOAT)?;
        encoder.write_f64(*n)?;
      }
      Value::Str(s) => {
        encoder.write_u8(tags::STRING)?;
        encoder.write_str(s)?;
      }
      Value::Bytes(bytes) => {
        encoder.write_u8(tags::BYTES)?;
        encoder.write_bytes(bytes)?;
      }
      other => {
        return Err(EncodeError::Unserializable(format!(
          "`{}` is not a primitive",
          other.type_name()
        )));
      }
    }
    Ok(())
  }

  fn decode(&self, ctx: &mut ReadContext<'_>, tag: u8) -> Result<Value, CacheError> {
    let value = match tag {
      tags::NULL => Value::Null,
      tags::TRUE => Value::Bool(true),
      tags::FALSE => Value::Bool(false),
      tags::INT => Value::Int(ctx.decoder().read_var_i64()?),
      tags::FLOAT => Value::Float(ctx.decoder().read_f64()?),
      tags::STRING => Value::Str(ctx.decoder().read_str()?),
      tags::BYTES => Value::Bytes(ctx.decoder().read_bytes()?),
      _ => return Err(ctx.unknown_tag(tag)),
    };
    Ok(value)
  }
}
