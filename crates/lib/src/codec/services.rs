//! Infrastructure service references.
//!
//! Services are never serialized. Only the name is written, and reading
//! resolves the name against the host's current named services.

use crate::context::{ReadContext, WriteContext};
use crate::error::CacheError;
use crate::problems::{Problem, ProblemKind};

use super::{CodecFamily, EncodeError, MissingValue, Value, tags};

pub struct ServiceCodec;

impl CodecFamily for ServiceCodec {
  fn name(&self) -> &'static str {
    "services"
  }

  fn tags(&self) -> &'static [u8] {
    &[tags::SERVICE]
  }

  fn claims(&self, value: &Value) -> bool {
    matches!(value, Value::Service(_))
  }

  fn encode(&self, ctx: &mut WriteContext<'_>, value: &Value) -> Result<(), EncodeError> {
    let Value::Service(service) = value else {
      return Err(EncodeError::Unserializable(format!(
        "`{}` is not a service",
        value.type_name()
      )));
    };

    let provided = ctx.codecs().collaborators().services.named(&service.name).is_some();
    if !provided {
      return Err(EncodeError::Unserializable(format!(
        "service `{}` is not provided by the host",
        service.name
      )));
    }

    ctx.encoder().write_u8(tags::SERVICE)?;
    ctx.write_str(&service.name)?;
    Ok(())
  }

  fn decode(&self, ctx: &mut ReadContext<'_>, tag: u8) -> Result<Value, CacheError> {
    if tag != tags::SERVICE {
      return Err(ctx.unknown_tag(tag));
    }
    let name = ctx.read_str()?;
    if let Some(service) = ctx.codecs().collaborators().services.named(&name) {
      return Ok(Value::Service(service));
    }

    let type_name = format!("service {name}");
    let reason = format!("service `{name}` is not provided by the host");
    ctx.record(Problem::new(ProblemKind::UnresolvedService, reason.clone()).with_type(type_name.clone()));
    Ok(Value::Missing(MissingValue {
      type_name: Some(type_name),
      reason,
    }))
  }
}
