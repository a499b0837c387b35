//! Isolates: independent namespaces of user types.
//!
//! Two builds (or two plugins of one build) may both define a type called
//! `Settings` with different shapes. Every user bean is therefore written
//! inside an active isolate and its type is resolved against that isolate's
//! type table only. Reading re-enters the isolate by key, so a bean always
//! comes back as the type it was written as, or not at all.
//!
//! An [`IsolateKey`] is opaque. Hosts typically derive it from the owning
//! build and a hash of the type hierarchy visible to it, so that a changed
//! hierarchy yields a different key and old entries are rejected.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::bean::TypeDescriptor;

/// Identifies one isolate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IsolateKey(String);

impl IsolateKey {
  pub fn new(key: impl Into<String>) -> Self {
    Self(key.into())
  }

  /// Key for `owner` whose visible types hash to `hierarchy_hash`.
  pub fn for_hierarchy(owner: &str, hierarchy_hash: &str) -> Self {
    Self(format!("{owner}@{hierarchy_hash}"))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for IsolateKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<&str> for IsolateKey {
  fn from(key: &str) -> Self {
    IsolateKey::new(key)
  }
}

/// The user types visible inside one isolate.
#[derive(Debug, Clone, Default)]
pub struct IsolateTypes {
  types: BTreeMap<String, Arc<TypeDescriptor>>,
}

impl IsolateTypes {
  pub fn new() -> Self {
    Self::default()
  }

  /// Declare a type, replacing any previous declaration of the same name.
  pub fn declare(mut self, descriptor: TypeDescriptor) -> Self {
    self.types.insert(descriptor.name().to_string(), Arc::new(descriptor));
    self
  }

  pub fn get(&self, type_name: &str) -> Option<&Arc<TypeDescriptor>> {
    self.types.get(type_name)
  }

  pub fn contains(&self, type_name: &str) -> bool {
    self.types.contains_key(type_name)
  }

  pub fn len(&self) -> usize {
    self.types.len()
  }

  pub fn is_empty(&self) -> bool {
    self.types.is_empty()
  }
}

/// Lookup table from isolate key to its type table.
///
/// Injected by the host and read-only while entries are written or read.
#[derive(Debug, Clone, Default)]
pub struct IsolateRegistry {
  isolates: BTreeMap<IsolateKey, Arc<IsolateTypes>>,
}

impl IsolateRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(mut self, key: impl Into<IsolateKey>, types: IsolateTypes) -> Self {
    self.isolates.insert(key.into(), Arc::new(types));
    self
  }

  pub fn get(&self, key: &IsolateKey) -> Option<Arc<IsolateTypes>> {
    self.isolates.get(key).cloned()
  }

  pub fn keys(&self) -> impl Iterator<Item = &IsolateKey> {
    self.isolates.keys()
  }
}

/// An isolate entered by a read or write context.
#[derive(Debug, Clone)]
pub struct ActiveIsolate {
  pub key: IsolateKey,
  pub types: Arc<IsolateTypes>,
}
