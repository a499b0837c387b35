//! The bean constructor service.
//!
//! Reconstructs bean instances during read from the strategy recorded at write
//! time. The same validation runs on both sides: a bean whose recorded
//! strategy its type does not declare is refused on write, so well-formed
//! entries only fail here when the declaring type changed between runs.

use thiserror::Error;

use super::types::{Bean, Construction, TypeDescriptor};

/// Errors raised when a bean cannot be reconstructed.
///
/// These are recoverable: the caller records them as problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
  #[error("type `{type_name}` has no default constructor")]
  NotDefaultConstructible { type_name: String },

  #[error("type `{type_name}` declares no constructor {signature}")]
  UnknownConstructor { type_name: String, signature: String },

  #[error("constructor {signature} of `{type_name}` takes {expected} argument(s), {found} recorded")]
  ArityMismatch {
    type_name: String,
    signature: String,
    expected: usize,
    found: usize,
  },

  #[error("type `{type_name}` declares no factory `{factory}`")]
  UnknownFactory { type_name: String, factory: String },

  #[error("factory `{factory}` of `{type_name}` failed: {message}")]
  FactoryFailed {
    type_name: String,
    factory: String,
    message: String,
  },
}

/// Check that `descriptor` supports the recorded `construction`.
pub fn validate(descriptor: &TypeDescriptor, construction: &Construction) -> Result<(), ConstructionError> {
  let type_name = descriptor.name().to_string();
  match construction {
    Construction::Default if descriptor.is_default_constructible() => Ok(()),
    Construction::Default => Err(ConstructionError::NotDefaultConstructible { type_name }),
    Construction::Constructor { signature, args } => match descriptor.constructor_arity(signature) {
      Some(expected) if expected == args.len() => Ok(()),
      Some(expected) => Err(ConstructionError::ArityMismatch {
        type_name,
        signature: signature.clone(),
        expected,
        found: args.len(),
      }),
      None => Err(ConstructionError::UnknownConstructor {
        type_name,
        signature: signature.clone(),
      }),
    },
    Construction::Factory { name, .. } => match descriptor.factory_fn(name) {
      Some(_) => Ok(()),
      None => Err(ConstructionError::UnknownFactory {
        type_name,
        factory: name.clone(),
      }),
    },
  }
}

/// Produces fresh bean instances from recorded construction metadata.
pub trait BeanConstructors: Send + Sync {
  /// Construct a new instance of `descriptor` using `construction`.
  ///
  /// The returned bean carries `construction` so that writing it again
  /// records the same strategy. Fields restored from the stream are applied
  /// by the caller afterwards.
  fn construct(&self, descriptor: &TypeDescriptor, construction: Construction) -> Result<Bean, ConstructionError>;
}

/// Constructor service that honours exactly what the descriptor declares.
///
/// Constructor arguments are kept on the recorded strategy; factories are
/// invoked and their output becomes the bean's initial fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBeanConstructors;

impl BeanConstructors for DefaultBeanConstructors {
  fn construct(&self, descriptor: &TypeDescriptor, construction: Construction) -> Result<Bean, ConstructionError> {
    validate(descriptor, &construction)?;

    let initial_fields = match &construction {
      Construction::Factory { name, args } => {
        let factory = descriptor.factory_fn(name).ok_or_else(|| ConstructionError::UnknownFactory {
          type_name: descriptor.name().to_string(),
          factory: name.clone(),
        })?;
        factory(args).map_err(|message| ConstructionError::FactoryFailed {
          type_name: descriptor.name().to_string(),
          factory: name.clone(),
          message,
        })?
      }
      _ => Vec::new(),
    };

    let mut bean = Bean::new(descriptor.name()).with_construction(construction);
    for (name, value) in initial_fields {
      bean.set(name, value);
    }
    Ok(bean)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::codec::Value;

  fn point() -> TypeDescriptor {
    TypeDescriptor::new("Point")
      .constructor("(int,int)", 2)
      .factory("origin", |_| Ok(vec![("x".to_string(), Value::Int(0)), ("y".to_string(), Value::Int(0))]))
      .factory("broken", |_| Err("no origin today".to_string()))
  }

  #[test]
  fn default_requires_declaration() {
    let constructors = DefaultBeanConstructors;
    let result = constructors.construct(&point(), Construction::Default);
    assert_eq!(
      result,
      Err(ConstructionError::NotDefaultConstructible {
        type_name: "Point".to_string()
      })
    );

    let plain = TypeDescriptor::new("Plain").default_constructible();
    let bean = constructors.construct(&plain, Construction::Default).unwrap();
    assert_eq!(bean.type_name(), "Plain");
    assert!(bean.fields().is_empty());
  }

  #[test]
  fn constructor_keeps_recorded_arguments() {
    let construction = Construction::constructor("(int,int)", vec![Value::Int(1), Value::Int(2)]);
    let bean = DefaultBeanConstructors.construct(&point(), construction.clone()).unwrap();
    assert_eq!(bean.construction(), &construction);
  }

  #[test]
  fn constructor_arity_is_checked() {
    let construction = Construction::constructor("(int,int)", vec![Value::Int(1)]);
    let result = DefaultBeanConstructors.construct(&point(), construction);
    assert!(matches!(
      result,
      Err(ConstructionError::ArityMismatch {
        expected: 2,
        found: 1,
        ..
      })
    ));
  }

  #[test]
  fn unknown_constructor_is_rejected() {
    let construction = Construction::constructor("(String)", vec![Value::from("a")]);
    let result = validate(&point(), &construction);
    assert!(matches!(result, Err(ConstructionError::UnknownConstructor { .. })));
  }

  #[test]
  fn factory_supplies_initial_fields() {
    let bean = DefaultBeanConstructors
      .construct(&point(), Construction::factory("origin", vec![]))
      .unwrap();
    assert_eq!(bean.field("x"), Some(&Value::Int(0)));
    assert_eq!(bean.field("y"), Some(&Value::Int(0)));
  }

  #[test]
  fn factory_failure_is_reported() {
    let result = DefaultBeanConstructors.construct(&point(), Construction::factory("broken", vec![]));
    assert!(matches!(
      result,
      Err(ConstructionError::FactoryFailed { ref message, .. }) if message == "no origin today"
    ));
  }

  #[test]
  fn unknown_factory_is_rejected() {
    let result = validate(&point(), &Construction::factory("nope", vec![]));
    assert!(matches!(result, Err(ConstructionError::UnknownFactory { .. })));
  }
}
