//! User beans.
//!
//! A bean is written once per segment; later occurrences are back
//! references by id, which preserves shared instances and cycles. The
//! layout of a first occurrence is:
//!
//! ```text
//! BEAN, type-ref, construction, fields
//! ```
//!
//! where `construction` is a kind byte (`0` default, `1` constructor,
//! `2` factory) followed by the constructor signature or factory name and the
//! argument values. The bean's id is assigned after the construction
//! arguments on both sides, so a bean reachable from its own arguments is
//! refused instead of producing a reference that cannot be resolved.
//!
//! Every bean must be written inside an isolate that declares its type.

use crate::bean::{BeanRef, Construction, validate};
use crate::context::{ReadContext, WriteContext};
use crate::error::{CacheError, ContractViolation};
use crate::problems::{Problem, ProblemKind, TraceFrame};

use super::{CodecFamily, EncodeError, MissingValue, Value, tags};

const DEFAULT_CONSTRUCTION: u8 = 0;
const CONSTRUCTOR: u8 = 1;
const FACTORY: u8 = 2;

pub struct BeanCodec;

impl CodecFamily for BeanCodec {
  fn name(&self) -> &'static str {
    "beans"
  }

  fn tags(&self) -> &'static [u8] {
    &[tags::BEAN, tags::BEAN_REF]
  }

  fn claims(&self, value: &Value) -> bool {
    matches!(value, Value::Bean(_))
  }

  fn encode(&self, ctx: &mut WriteContext<'_>, value: &Value) -> Result<(), EncodeError> {
    let Value::Bean(bean) = value else {
      return Err(EncodeError::Unserializable(format!(
        "`{}` is not a bean",
        value.type_name()
      )));
    };

    if let Some(id) = ctx.bean_id(bean) {
      ctx.encoder().write_u8(tags::BEAN_REF)?;
      ctx.encoder().write_var_u64(u64::from(id))?;
      return Ok(());
    }

    let type_name = bean.type_name();
    if ctx.is_constructing(bean) {
      return Err(EncodeError::Unserializable(format!(
        "bean `{type_name}` is reachable from its own constructor arguments"
      )));
    }

    let isolate = ctx.active_isolate().cloned().ok_or_else(|| {
      CacheError::from(ContractViolation::NoActiveIsolate {
        type_name: type_name.clone(),
      })
    })?;
    let descriptor = isolate.types.get(&type_name).cloned().ok_or_else(|| {
      EncodeError::Unserializable(format!(
        "type `{type_name}` is not declared in isolate `{}`",
        isolate.key
      ))
    })?;

    let data = bean.borrow();
    validate(&descriptor, data.construction()).map_err(|e| EncodeError::Unserializable(e.to_string()))?;

    ctx.frame(TraceFrame::Bean(type_name.clone()), |ctx| -> Result<(), CacheError> {
      ctx.encoder().write_u8(tags::BEAN)?;
      ctx.write_type_ref(&isolate.key, &type_name)?;
      write_construction(ctx, bean, data.construction())?;
      ctx.assign_bean_id(bean);

      ctx.write_len(data.fields().len())?;
      for (name, field) in data.fields() {
        ctx.write_str(name)?;
        ctx.frame(TraceFrame::Field(name.clone()), |ctx| ctx.write(field))?;
      }
      Ok(())
    })?;
    Ok(())
  }

  fn decode(&self, ctx: &mut ReadContext<'_>, tag: u8) -> Result<Value, CacheError> {
    match tag {
      tags::BEAN_REF => {
        let id = ctx.decoder().read_var_u64()?;
        ctx
          .bean(id)
          .ok_or_else(|| ContractViolation::DanglingReference { id }.into())
      }
      tags::BEAN => read_bean(ctx),
      _ => Err(ctx.unknown_tag(tag)),
    }
  }
}

fn write_construction(ctx: &mut WriteContext<'_>, bean: &BeanRef, construction: &Construction) -> Result<(), CacheError> {
  match construction {
    Construction::Default => {
      ctx.encoder().write_u8(DEFAULT_CONSTRUCTION)?;
      Ok(())
    }
    Construction::Constructor { signature, args } => {
      ctx.encoder().write_u8(CONSTRUCTOR)?;
      ctx.write_str(signature)?;
      write_args(ctx, bean, args)
    }
    Construction::Factory { name, args } => {
      ctx.encoder().write_u8(FACTORY)?;
      ctx.write_str(name)?;
      write_args(ctx, bean, args)
    }
  }
}

fn write_args(ctx: &mut WriteContext<'_>, bean: &BeanRef, args: &[Value]) -> Result<(), CacheError> {
  ctx.begin_construction(bean);
  let result = write_arg_values(ctx, args);
  ctx.end_construction(bean);
  result
}

fn write_arg_values(ctx: &mut WriteContext<'_>, args: &[Value]) -> Result<(), CacheError> {
  ctx.write_len(args.len())?;
  for (index, arg) in args.iter().enumerate() {
    ctx.frame(TraceFrame::ConstructorArg(index), |ctx| ctx.write(arg))?;
  }
  Ok(())
}

fn read_bean(ctx: &mut ReadContext<'_>) -> Result<Value, CacheError> {
  let (isolate_key, type_name) = ctx.read_type_ref()?;
  let active = ctx
    .active_isolate()
    .cloned()
    .ok_or_else(|| ContractViolation::NoActiveIsolate {
      type_name: type_name.clone(),
    })?;
  if active.key != isolate_key {
    return Err(
      ContractViolation::IsolateMismatch {
        expected: active.key.to_string(),
        found: isolate_key.to_string(),
      }
      .into(),
    );
  }

  ctx.frame(TraceFrame::Bean(type_name.clone()), |ctx| -> Result<Value, CacheError> {
    let construction = read_construction(ctx)?;

    let instance = match active.types.get(&type_name) {
      Some(descriptor) => {
        let constructors = ctx.codecs().collaborators().beans.clone();
        constructors
          .construct(descriptor, construction)
          .map(BeanRef::new)
          .map_err(|e| (ProblemKind::ConstructionFailed, e.to_string()))
      }
      None => Err((
        ProblemKind::UnknownType,
        format!("type `{type_name}` is not declared in isolate `{}`", active.key),
      )),
    };

    match instance {
      Ok(bean) => {
        ctx.register_bean(Value::Bean(bean.clone()));
        let fields = read_fields(ctx)?;
        let mut data = bean.borrow_mut();
        for (name, value) in fields {
          data.set(name, value);
        }
        drop(data);
        Ok(Value::Bean(bean))
      }
      Err((kind, reason)) => {
        ctx.record(Problem::new(kind, reason.clone()).with_type(type_name.clone()));
        let missing = Value::Missing(MissingValue {
          type_name: Some(type_name.clone()),
          reason,
        });
        ctx.register_bean(missing.clone());
        read_fields(ctx)?;
        Ok(missing)
      }
    }
  })
}

fn read_construction(ctx: &mut ReadContext<'_>) -> Result<Construction, CacheError> {
  match ctx.decoder().read_u8()? {
    DEFAULT_CONSTRUCTION => Ok(Construction::Default),
    CONSTRUCTOR => {
      let signature = ctx.read_str()?;
      let args = read_args(ctx)?;
      Ok(Construction::Constructor { signature, args })
    }
    FACTORY => {
      let name = ctx.read_str()?;
      let args = read_args(ctx)?;
      Ok(Construction::Factory { name, args })
    }
    kind => Err(ctx.corrupt(format!("unknown construction kind {kind}"))),
  }
}

fn read_args(ctx: &mut ReadContext<'_>) -> Result<Vec<Value>, CacheError> {
  let len = ctx.read_len()?;
  let mut args = Vec::with_capacity(len.min(64));
  for index in 0..len {
    args.push(ctx.frame(TraceFrame::ConstructorArg(index), |ctx| ctx.read())?);
  }
  Ok(args)
}

fn read_fields(ctx: &mut ReadContext<'_>) -> Result<Vec<(String, Value)>, CacheError> {
  let len = ctx.read_len()?;
  let mut fields = Vec::with_capacity(len.min(256));
  for _ in 0..len {
    let name = ctx.read_str()?;
    let value = ctx.frame(TraceFrame::Field(name.clone()), |ctx| ctx.read())?;
    fields.push((name, value));
  }
  Ok(fields)
}
