use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::bean::{Bean, BeanRef};

/// A node in a configuration graph.
///
/// Everything a cache segment stores is expressed as a `Value`. Beans are
/// shared references, so a `Value` graph may contain shared sub-objects and
/// cycles; equality compares graphs structurally and requires the same
/// sharing on both sides.
#[derive(Debug, Clone)]
pub enum Value {
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(String),
  Bytes(Vec<u8>),
  /// A file system location.
  File(PathBuf),
  List(Vec<Value>),
  /// Ordered key/value pairs.
  Map(Vec<(Value, Value)>),
  /// A reference to an infrastructure service provided by the host.
  Service(ServiceRef),
  /// An instance of an isolate-scoped user type.
  Bean(BeanRef),
  /// A host object that no codec can persist.
  Opaque(OpaqueValue),
  /// Stands in for a value that could not be persisted or restored.
  Missing(MissingValue),
}

impl Value {
  pub fn bean(bean: Bean) -> Self {
    Value::Bean(BeanRef::new(bean))
  }

  pub fn opaque(type_name: impl Into<String>) -> Self {
    Value::Opaque(OpaqueValue {
      type_name: type_name.into(),
    })
  }

  pub fn map<K, V, I>(entries: I) -> Self
  where
    K: Into<Value>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
  {
    Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
  }

  /// Human readable name of the value's runtime type.
  pub fn type_name(&self) -> String {
    match self {
      Value::Null => "null".to_string(),
      Value::Bool(_) => "bool".to_string(),
      Value::Int(_) => "int".to_string(),
      Value::Float(_) => "float".to_string(),
      Value::Str(_) => "string".to_string(),
      Value::Bytes(_) => "bytes".to_string(),
      Value::File(_) => "file".to_string(),
      Value::List(_) => "list".to_string(),
      Value::Map(_) => "map".to_string(),
      Value::Service(service) => format!("service {}", service.name),
      Value::Bean(bean) => bean.type_name(),
      Value::Opaque(opaque) => opaque.type_name.clone(),
      Value::Missing(missing) => missing.type_name.clone().unwrap_or_else(|| "missing".to_string()),
    }
  }

  pub fn is_missing(&self) -> bool {
    matches!(self, Value::Missing(_))
  }

  pub fn as_bean(&self) -> Option<&BeanRef> {
    match self {
      Value::Bean(bean) => Some(bean),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::Str(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      Value::Int(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&[Value]> {
    match self {
      Value::List(items) => Some(items),
      _ => None,
    }
  }

  /// Look up a map entry by string key.
  pub fn get(&self, key: &str) -> Option<&Value> {
    match self {
      Value::Map(entries) => entries.iter().find(|(k, _)| k.as_str() == Some(key)).map(|(_, v)| v),
      _ => None,
    }
  }
}

impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Value::Bool(value)
  }
}

impl From<i64> for Value {
  fn from(value: i64) -> Self {
    Value::Int(value)
  }
}

impl From<f64> for Value {
  fn from(value: f64) -> Self {
    Value::Float(value)
  }
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Value::Str(value.to_string())
  }
}

impl From<String> for Value {
  fn from(value: String) -> Self {
    Value::Str(value)
  }
}

impl From<PathBuf> for Value {
  fn from(value: PathBuf) -> Self {
    Value::File(value)
  }
}

impl From<Vec<Value>> for Value {
  fn from(value: Vec<Value>) -> Self {
    Value::List(value)
  }
}

impl From<BeanRef> for Value {
  fn from(value: BeanRef) -> Self {
    Value::Bean(value)
  }
}

/// A reference to a named host service.
#[derive(Clone)]
pub struct ServiceRef {
  pub name: String,
  pub instance: Arc<dyn Any + Send + Sync>,
}

impl ServiceRef {
  pub fn new(name: impl Into<String>, instance: Arc<dyn Any + Send + Sync>) -> Self {
    Self {
      name: name.into(),
      instance,
    }
  }
}

impl fmt::Debug for ServiceRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("ServiceRef").field(&self.name).finish()
  }
}

/// A host object of a type the cache cannot persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueValue {
  pub type_name: String,
}

/// The read result of an unavailable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingValue {
  pub type_name: Option<String>,
  pub reason: String,
}

impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool {
    GraphMatcher::default().matches(self, other)
  }
}

/// Structural comparison that tracks bean correspondences.
///
/// Beans on the left are paired with beans on the right the first time they
/// meet. A pair already under comparison is assumed equal (which terminates
/// cycles), and a bean paired with two different counterparts makes the
/// graphs unequal (which makes sharing significant).
#[derive(Default)]
struct GraphMatcher {
  forward: HashMap<usize, usize>,
  backward: HashMap<usize, usize>,
}

impl GraphMatcher {
  fn matches(&mut self, left: &Value, right: &Value) -> bool {
    match (left, right) {
      (Value::Null, Value::Null) => true,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (Value::Int(a), Value::Int(b)) => a == b,
      (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits() || a == b,
      (Value::Str(a), Value::Str(b)) => a == b,
      (Value::Bytes(a), Value::Bytes(b)) => a == b,
      (Value::File(a), Value::File(b)) => a == b,
      (Value::List(a), Value::List(b)) => {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.matches(x, y))
      }
      (Value::Map(a), Value::Map(b)) => {
        a.len() == b.len()
          && a
            .iter()
            .zip(b)
            .all(|((ka, va), (kb, vb))| self.matches(ka, kb) && self.matches(va, vb))
      }
      (Value::Service(a), Value::Service(b)) => a.name == b.name,
      (Value::Opaque(a), Value::Opaque(b)) => a == b,
      (Value::Missing(a), Value::Missing(b)) => a == b,
      (Value::Bean(a), Value::Bean(b)) => self.matches_beans(a, b),
      _ => false,
    }
  }

  fn matches_beans(&mut self, left: &BeanRef, right: &BeanRef) -> bool {
    let (l, r) = (left.addr(), right.addr());
    match (self.forward.get(&l), self.backward.get(&r)) {
      (Some(&paired), _) if paired == r => return true,
      (Some(_), _) | (_, Some(_)) => return false,
      (None, None) => {}
    }
    self.forward.insert(l, r);
    self.backward.insert(r, l);

    let (a, b) = (left.borrow(), right.borrow());
    if a.type_name() != b.type_name() || a.fields().len() != b.fields().len() {
      return false;
    }
    if !self.matches_construction(a.construction(), b.construction()) {
      return false;
    }
    a.fields()
      .iter()
      .zip(b.fields())
      .all(|((na, va), (nb, vb))| na == nb && self.matches(va, vb))
  }

  fn matches_construction(&mut self, left: &crate::bean::Construction, right: &crate::bean::Construction) -> bool {
    use crate::bean::Construction;
    match (left, right) {
      (Construction::Default, Construction::Default) => true,
      (
        Construction::Constructor { signature: sa, args: aa },
        Construction::Constructor { signature: sb, args: ab },
      )
      | (Construction::Factory { name: sa, args: aa }, Construction::Factory { name: sb, args: ab }) => {
        sa == sb && aa.len() == ab.len() && aa.iter().zip(ab).all(|(x, y)| self.matches(x, y))
      }
      _ => false,
    }
  }
}
