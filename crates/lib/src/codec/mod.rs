//! Type-directed codec dispatch.
//!
//! A [`CodecRegistry`] holds a fixed, ordered list of codec families. Writing a
//! value asks each family in turn whether it claims the value; the first one
//! that does encodes it. Reading dispatches on the leading tag byte every
//! family writes in front of its values.
//!
//! # Family order
//!
//! | Priority | Family        | Tags            |
//! |----------|---------------|-----------------|
//! | 1        | collections   | `0x10`-`0x11`   |
//! | 2        | services      | `0x20`          |
//! | 3        | files         | `0x30`          |
//! | 4        | beans         | `0x40`-`0x41`   |
//! | 5        | primitives    | `0x50`-`0x56`   |
//!
//! The order and the tags are part of the on-disk format. The registry
//! [fingerprint](CodecRegistry::fingerprint) is derived from both and written
//! into every segment header, so a registry with a different layout refuses
//! old entries instead of misreading them.
//!
//! # Submodules
//!
//! - [`beans`] - User beans, identity and isolate checks
//! - [`collections`] - Lists and maps
//! - [`files`] - File references and the [`FileResolver`] collaborator
//! - [`primitives`] - Null, booleans, numbers, strings and bytes
//! - [`services`] - Infrastructure service references
//! - [`tags`] - Stream tag constants

pub mod beans;
pub mod collections;
pub mod files;
pub mod primitives;
pub mod services;
pub mod tags;
mod value;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::bean::BeanConstructors;
use crate::consts::{FINGERPRINT_LEN, FORMAT_VERSION};
use crate::context::{ReadContext, WriteContext};
use crate::error::CacheError;
use crate::host::ServiceRegistry;
use crate::isolate::IsolateRegistry;
use crate::stream::StreamError;
use crate::util::hash::hash_bytes;

pub use files::{BaseDirFileResolver, FileResolver, IdentityFileResolver};
pub use value::*;

/// Outcome of a family refusing or failing to encode a value.
#[derive(Debug)]
pub enum EncodeError {
  /// The value cannot be persisted. Must be returned before any byte of the
  /// value was written; the caller replaces it with a sentinel.
  Unserializable(String),
  /// Anything else aborts the write.
  Fatal(CacheError),
}

impl From<CacheError> for EncodeError {
  fn from(error: CacheError) -> Self {
    EncodeError::Fatal(error)
  }
}

impl From<StreamError> for EncodeError {
  fn from(error: StreamError) -> Self {
    EncodeError::Fatal(CacheError::Stream(error))
  }
}

/// A strategy for one group of related value shapes.
pub trait CodecFamily: Send + Sync {
  /// Stable family name, part of the registry fingerprint.
  fn name(&self) -> &'static str;

  /// Every tag this family writes and reads.
  fn tags(&self) -> &'static [u8];

  /// Whether this family is responsible for `value`.
  fn claims(&self, value: &Value) -> bool;

  /// Write `value`, including its leading tag.
  fn encode(&self, ctx: &mut WriteContext<'_>, value: &Value) -> Result<(), EncodeError>;

  /// Read a value whose leading `tag` has already been consumed.
  fn decode(&self, ctx: &mut ReadContext<'_>, tag: u8) -> Result<Value, CacheError>;
}

/// The services codec families depend on.
#[derive(Clone)]
pub struct Collaborators {
  pub isolates: Arc<IsolateRegistry>,
  pub beans: Arc<dyn BeanConstructors>,
  pub files: Arc<dyn FileResolver>,
  pub services: ServiceRegistry,
}

impl Collaborators {
  /// Pick the collaborators out of the host's services.
  pub fn from_services(services: &ServiceRegistry) -> Result<Self, CacheError> {
    Ok(Self {
      isolates: require::<Arc<IsolateRegistry>>(services)?,
      beans: require::<Arc<dyn BeanConstructors>>(services)?,
      files: require::<Arc<dyn FileResolver>>(services)?,
      services: services.clone(),
    })
  }
}

fn require<T: std::any::Any + Send + Sync + Clone>(services: &ServiceRegistry) -> Result<T, CacheError> {
  services
    .service::<T>()
    .ok_or(CacheError::MissingService(ServiceRegistry::service_name::<T>()))
}

/// The families in their format-defined priority order.
pub fn standard_families() -> Vec<Arc<dyn CodecFamily>> {
  vec![
    Arc::new(collections::CollectionCodecs),
    Arc::new(services::ServiceCodec),
    Arc::new(files::FileCodec),
    Arc::new(beans::BeanCodec),
    Arc::new(primitives::PrimitiveCodecs),
  ]
}

/// Ordered codec families plus the collaborators they use.
pub struct CodecRegistry {
  families: Vec<Arc<dyn CodecFamily>>,
  by_tag: HashMap<u8, usize>,
  collaborators: Collaborators,
  fingerprint: String,
}

impl CodecRegistry {
  /// Build a registry from `families`, tried in the given order.
  ///
  /// Fails if two families share a tag or a family uses the reserved
  /// sentinel tag.
  pub fn new(families: Vec<Arc<dyn CodecFamily>>, collaborators: Collaborators) -> Result<Self, CacheError> {
    let mut by_tag = HashMap::new();
    for (index, family) in families.iter().enumerate() {
      for &tag in family.tags() {
        if tag == tags::UNAVAILABLE {
          return Err(CacheError::Registry(format!(
            "family `{}` uses the reserved sentinel tag {tag:#04x}",
            family.name()
          )));
        }
        if let Some(previous) = by_tag.insert(tag, index) {
          return Err(CacheError::Registry(format!(
            "tag {tag:#04x} claimed by both `{}` and `{}`",
            families[previous].name(),
            family.name()
          )));
        }
      }
    }
    let fingerprint = fingerprint_of(&families);
    Ok(Self {
      families,
      by_tag,
      collaborators,
      fingerprint,
    })
  }

  /// The standard families over `collaborators`.
  pub fn standard(collaborators: Collaborators) -> Result<Self, CacheError> {
    Self::new(standard_families(), collaborators)
  }

  /// The standard families over collaborators looked up in `services`.
  pub fn from_services(services: &ServiceRegistry) -> Result<Self, CacheError> {
    Self::standard(Collaborators::from_services(services)?)
  }

  /// First family claiming `value`, if any.
  pub fn resolve(&self, value: &Value) -> Option<&Arc<dyn CodecFamily>> {
    self.families.iter().find(|family| family.claims(value))
  }

  pub fn family_for_tag(&self, tag: u8) -> Option<&Arc<dyn CodecFamily>> {
    self.by_tag.get(&tag).map(|&index| &self.families[index])
  }

  pub fn collaborators(&self) -> &Collaborators {
    &self.collaborators
  }

  /// Digest of the format version and the ordered family layout.
  pub fn fingerprint(&self) -> &str {
    &self.fingerprint
  }

  pub fn family_names(&self) -> Vec<&'static str> {
    self.families.iter().map(|family| family.name()).collect()
  }
}

impl fmt::Debug for CodecRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CodecRegistry")
      .field("families", &self.family_names())
      .field("fingerprint", &self.fingerprint)
      .finish()
  }
}

fn fingerprint_of(families: &[Arc<dyn CodecFamily>]) -> String {
  let mut layout = format!("format:{FORMAT_VERSION};");
  for family in families {
    layout.push_str(family.name());
    layout.push(':');
    layout.push_str(&hex::encode(family.tags()));
    layout.push(';');
  }
  let mut digest = hash_bytes(layout.as_bytes()).0;
  digest.truncate(FINGERPRINT_LEN);
  digest
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bean::{Bean, DefaultBeanConstructors};

  fn collaborators() -> Collaborators {
    Collaborators::from_services(&ServiceRegistry::with_defaults(IsolateRegistry::new())).unwrap()
  }

  #[test]
  fn families_resolve_in_priority_order() {
    let registry = CodecRegistry::standard(collaborators()).unwrap();
    assert_eq!(
      registry.family_names(),
      vec!["collections", "services", "files", "beans", "primitives"]
    );
    assert_eq!(registry.resolve(&Value::List(vec![])).unwrap().name(), "collections");
    assert_eq!(registry.resolve(&Value::File("/a".into())).unwrap().name(), "files");
    assert_eq!(registry.resolve(&Value::bean(Bean::new("T"))).unwrap().name(), "beans");
    assert_eq!(registry.resolve(&Value::Int(1)).unwrap().name(), "primitives");
  }

  #[test]
  fn opaque_values_have_no_codec() {
    let registry = CodecRegistry::standard(collaborators()).unwrap();
    assert!(registry.resolve(&Value::opaque("std::net::TcpStream")).is_none());
  }

  #[test]
  fn tags_dispatch_to_owning_family() {
    let registry = CodecRegistry::standard(collaborators()).unwrap();
    assert_eq!(registry.family_for_tag(tags::MAP).unwrap().name(), "collections");
    assert_eq!(registry.family_for_tag(tags::BEAN_REF).unwrap().name(), "beans");
    assert!(registry.family_for_tag(0xee).is_none());
    assert!(registry.family_for_tag(tags::UNAVAILABLE).is_none());
  }

  #[test]
  fn duplicate_tags_are_rejected() {
    let families: Vec<Arc<dyn CodecFamily>> =
      vec![Arc::new(primitives::PrimitiveCodecs), Arc::new(primitives::PrimitiveCodecs)];
    let result = CodecRegistry::new(families, collaborators());
    assert!(matches!(result, Err(CacheError::Registry(_))));
  }

  #[test]
  fn fingerprint_depends_on_family_order() {
    let standard = CodecRegistry::standard(collaborators()).unwrap();
    let mut reordered = standard_families();
    reordered.reverse();
    let reordered = CodecRegistry::new(reordered, collaborators()).unwrap();

    assert_eq!(standard.fingerprint().len(), FINGERPRINT_LEN);
    assert_ne!(standard.fingerprint(), reordered.fingerprint());
    assert_eq!(
      standard.fingerprint(),
      CodecRegistry::standard(collaborators()).unwrap().fingerprint()
    );
  }

  #[test]
  fn missing_collaborator_is_reported() {
    let services = ServiceRegistry::new().with::<Arc<dyn BeanConstructors>>(Arc::new(DefaultBeanConstructors));
    let result = CodecRegistry::from_services(&services);
    assert!(matches!(result, Err(CacheError::MissingService(_))));
  }
}
