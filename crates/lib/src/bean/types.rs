use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::codec::Value;

/// How a bean instance came to exist, recorded alongside its fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Construction {
  /// No-argument construction.
  Default,
  /// A declared constructor invoked with recorded argument values.
  Constructor { signature: String, args: Vec<Value> },
  /// A named factory callback invoked with recorded argument values.
  Factory { name: String, args: Vec<Value> },
}

impl Construction {
  pub fn constructor(signature: impl Into<String>, args: Vec<Value>) -> Self {
    Construction::Constructor {
      signature: signature.into(),
      args,
    }
  }

  pub fn factory(name: impl Into<String>, args: Vec<Value>) -> Self {
    Construction::Factory {
      name: name.into(),
      args,
    }
  }

  pub fn args(&self) -> &[Value] {
    match self {
      Construction::Default => &[],
      Construction::Constructor { args, .. } | Construction::Factory { args, .. } => args,
    }
  }
}

impl fmt::Display for Construction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Construction::Default => write!(f, "default constructor"),
      Construction::Constructor { signature, .. } => write!(f, "constructor {signature}"),
      Construction::Factory { name, .. } => write!(f, "factory `{name}`"),
    }
  }
}

/// An instance of a user type.
#[derive(Debug, Clone, PartialEq)]
pub struct Bean {
  type_name: String,
  construction: Construction,
  fields: Vec<(String, Value)>,
}

impl Bean {
  /// Create a default-constructed bean with no fields.
  pub fn new(type_name: impl Into<String>) -> Self {
    Self {
      type_name: type_name.into(),
      construction: Construction::Default,
      fields: Vec::new(),
    }
  }

  pub fn with_construction(mut self, construction: Construction) -> Self {
    self.construction = construction;
    self
  }

  pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
    self.set(name, value);
    self
  }

  pub fn type_name(&self) -> &str {
    &self.type_name
  }

  pub fn construction(&self) -> &Construction {
    &self.construction
  }

  /// Fields in declaration order.
  pub fn fields(&self) -> &[(String, Value)] {
    &self.fields
  }

  pub fn field(&self, name: &str) -> Option<&Value> {
    self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
  }

  /// Set a field, replacing an existing value in place or appending a new one.
  pub fn set(&mut self, name: impl Into<String>, value: Value) {
    let name = name.into();
    match self.fields.iter_mut().find(|(n, _)| *n == name) {
      Some(slot) => slot.1 = value,
      None => self.fields.push((name, value)),
    }
  }
}

/// A shared, mutable reference to a bean.
///
/// Cloning the reference does not clone the bean: identity is what the cache
/// preserves when the same bean is reachable more than once.
#[derive(Clone)]
pub struct BeanRef(Rc<RefCell<Bean>>);

impl BeanRef {
  pub fn new(bean: Bean) -> Self {
    Self(Rc::new(RefCell::new(bean)))
  }

  pub fn borrow(&self) -> Ref<'_, Bean> {
    self.0.borrow()
  }

  pub fn borrow_mut(&self) -> RefMut<'_, Bean> {
    self.0.borrow_mut()
  }

  pub fn type_name(&self) -> String {
    self.0.borrow().type_name.clone()
  }

  /// Whether both references point at the same bean.
  pub fn ptr_eq(&self, other: &BeanRef) -> bool {
    Rc::ptr_eq(&self.0, &other.0)
  }

  /// Address of the shared bean, stable for as long as any reference lives.
  pub fn addr(&self) -> usize {
    Rc::as_ptr(&self.0) as *const () as usize
  }
}

impl From<Bean> for BeanRef {
  fn from(bean: Bean) -> Self {
    BeanRef::new(bean)
  }
}

// Shallow on purpose: bean graphs may be cyclic.
impl fmt::Debug for BeanRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.0.try_borrow() {
      Ok(bean) => write!(f, "BeanRef({}@{:#x})", bean.type_name, self.addr()),
      Err(_) => write!(f, "BeanRef(<borrowed>@{:#x})", self.addr()),
    }
  }
}

/// Callback that produces the initial fields of a bean from factory arguments.
pub type FactoryFn = Arc<dyn Fn(&[Value]) -> Result<Vec<(String, Value)>, String> + Send + Sync>;

/// Declares a user type and the construction strategies it supports.
#[derive(Clone)]
pub struct TypeDescriptor {
  name: String,
  default_constructible: bool,
  constructors: BTreeMap<String, usize>,
  factories: BTreeMap<String, FactoryFn>,
}

impl TypeDescriptor {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      default_constructible: false,
      constructors: BTreeMap::new(),
      factories: BTreeMap::new(),
    }
  }

  pub fn default_constructible(mut self) -> Self {
    self.default_constructible = true;
    self
  }

  /// Declare a constructor by signature and arity.
  pub fn constructor(mut self, signature: impl Into<String>, arity: usize) -> Self {
    self.constructors.insert(signature.into(), arity);
    self
  }

  pub fn factory<F>(mut self, name: impl Into<String>, factory: F) -> Self
  where
    F: Fn(&[Value]) -> Result<Vec<(String, Value)>, String> + Send + Sync + 'static,
  {
    self.factories.insert(name.into(), Arc::new(factory));
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn is_default_constructible(&self) -> bool {
    self.default_constructible
  }

  pub fn constructor_arity(&self, signature: &str) -> Option<usize> {
    self.constructors.get(signature).copied()
  }

  pub fn factory_fn(&self, name: &str) -> Option<&FactoryFn> {
    self.factories.get(name)
  }
}

impl fmt::Debug for TypeDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TypeDescriptor")
      .field("name", &self.name)
      .field("default_constructible", &self.default_constructible)
      .field("constructors", &self.constructors)
      .field("factories", &self.factories.keys().collect::<Vec<_>>())
      .finish()
  }
}
