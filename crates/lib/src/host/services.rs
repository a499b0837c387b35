use std::any::{Any, TypeId, type_name};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::bean::{BeanConstructors, DefaultBeanConstructors};
use crate::codec::{FileResolver, IdentityFileResolver, ServiceRef};
use crate::isolate::IsolateRegistry;

/// Typed and named service lookup provided by the host.
///
/// Typed services are the collaborators the codec registry needs (looked up
/// with [`service`](Self::service)). Named services are infrastructure
/// objects that configuration graphs may reference and that the cache
/// persists by name only.
#[derive(Default, Clone)]
pub struct ServiceRegistry {
  typed: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
  named: BTreeMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ServiceRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry holding the stock collaborators: an isolate registry, the
  /// default bean constructors and the identity file resolver.
  pub fn with_defaults(isolates: IsolateRegistry) -> Self {
    Self::new()
      .with(Arc::new(isolates))
      .with::<Arc<dyn BeanConstructors>>(Arc::new(DefaultBeanConstructors))
      .with::<Arc<dyn FileResolver>>(Arc::new(IdentityFileResolver))
  }

  /// Register `service` under its own type.
  pub fn with<T: Any + Send + Sync>(mut self, service: T) -> Self {
    self.typed.insert(TypeId::of::<T>(), Arc::new(service));
    self
  }

  /// Register an infrastructure service reachable by name from graphs.
  pub fn with_named(mut self, name: impl Into<String>, service: Arc<dyn Any + Send + Sync>) -> Self {
    self.named.insert(name.into(), service);
    self
  }

  /// Look up a typed service.
  pub fn service<T: Any + Send + Sync + Clone>(&self) -> Option<T> {
    self
      .typed
      .get(&TypeId::of::<T>())
      .and_then(|service| service.downcast_ref::<T>())
      .cloned()
  }

  /// Name of `T`, for error messages about missing services.
  pub fn service_name<T: Any>() -> &'static str {
    type_name::<T>()
  }

  /// Reference to a named service, if the host provides it.
  pub fn named(&self, name: &str) -> Option<ServiceRef> {
    self
      .named
      .get(name)
      .map(|instance| ServiceRef::new(name, instance.clone()))
  }

  pub fn named_services(&self) -> impl Iterator<Item = &str> {
    self.named.keys().map(String::as_str)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Clone, PartialEq)]
  struct ListenerManager(u32);

  #[test]
  fn typed_lookup() {
    let services = ServiceRegistry::new().with(ListenerManager(7));
    assert_eq!(services.service::<ListenerManager>(), Some(ListenerManager(7)));
    assert_eq!(services.service::<String>(), None);
  }

  #[test]
  fn trait_object_services_are_keyed_by_arc_type() {
    let services = ServiceRegistry::with_defaults(IsolateRegistry::new());
    assert!(services.service::<Arc<dyn BeanConstructors>>().is_some());
    assert!(services.service::<Arc<dyn FileResolver>>().is_some());
    assert!(services.service::<Arc<IsolateRegistry>>().is_some());
  }

  #[test]
  fn named_services_resolve_to_shared_instances() {
    let manager: Arc<dyn Any + Send + Sync> = Arc::new(ListenerManager(1));
    let services = ServiceRegistry::new().with_named("listenerManager", manager.clone());

    let resolved = services.named("listenerManager").unwrap();
    assert_eq!(resolved.name, "listenerManager");
    assert!(Arc::ptr_eq(&resolved.instance, &manager));
    assert!(services.named("buildOperations").is_none());
  }
}
