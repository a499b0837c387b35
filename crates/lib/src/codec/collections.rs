//! Lists and maps.
//!
//! Elements are written through the context, so an element that cannot be
//! persisted degrades to a sentinel without affecting its siblings.

use crate::context::{ReadContext, WriteContext};
use crate::error::CacheError;
use crate::problems::TraceFrame;

use super::{CodecFamily, EncodeError, Value, tags};

/// Ordered sequences and ordered key/value maps.
pub struct CollectionCodecs;

impl CodecFamily for CollectionCodecs {
  fn name(&self) -> &'static str {
    "collections"
  }

  fn tags(&self) -> &'static [u8] {
    &[tags::LIST, tags::MAP]
  }

  fn claims(&self, value: &Value) -> bool {
    matches!(value, Value::List(_) | Value::Map(_))
  }

  fn encode(&self, ctx: &mut WriteContext<'_>, value: &Value) -> Result<(), EncodeError> {
    match value {
      Value::List(items) => {
        ctx.encoder().write_u8(tags::LIST)?;
        ctx.write_len(items.len())?;
        for (index, item) in items.iter().enumerate() {
          ctx.frame(TraceFrame::Element(index), |ctx| ctx.write(item))?;
        }
        Ok(())
      }
      Value::Map(entries) => {
        ctx.encoder().write_u8(tags::MAP)?;
        ctx.write_len(entries.len())?;
        for (index, (key, value)) in entries.iter().enumerate() {
          ctx.frame(TraceFrame::MapKey(index), |ctx| ctx.write(key))?;
          ctx.frame(TraceFrame::MapValue(index), |ctx| ctx.write(value))?;
        }
        Ok(())
      }
      other => Err(EncodeError::Unserializable(format!(
        "`{}` is not a collection",
        other.type_name()
      ))),
    }
  }

  fn decode(&self, ctx: &mut ReadContext<'_>, tag: u8) -> Result<Value, CacheError> {
    match tag {
      tags::LIST => {
        let len = ctx.read_len()?;
        let mut items = Vec::with_capacity(len.min(1024));
        for index in 0..len {
          items.push(ctx.frame(TraceFrame::Element(index), |ctx| ctx.read())?);
        }
        Ok(Value::List(items))
      }
      tags::MAP => {
        let len = ctx.read_len()?;
        let mut entries = Vec::with_capacity(len.min(1024));
        for index in 0..len {
          let key = ctx.frame(TraceFrame::MapKey(index), |ctx| ctx.read())?;
          let value = ctx.frame(TraceFrame::MapValue(index), |ctx| ctx.read())?;
          entries.push((key, value));
        }
        Ok(Value::Map(entries))
      }
      _ => Err(ctx.unknown_tag(tag)),
    }
  }
}
