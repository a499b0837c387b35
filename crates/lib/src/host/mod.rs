//! The interface the cache consumes from its host.
//!
//! The host owns the running build: it knows which build is current and it
//! provides the collaborators the codec registry is assembled from. The cache
//! never constructs those collaborators itself.

mod services;

pub use services::ServiceRegistry;

use crate::build::BuildDefinition;

/// The process hosting the cache.
pub trait BuildHost: Send + Sync {
  /// The build being configured or restored.
  ///
  /// Its isolate key is the one models are written under and the one root
  /// build state must match when read back.
  fn current_build(&self) -> &BuildDefinition;

  /// Collaborator services.
  fn services(&self) -> &ServiceRegistry;
}

/// A host with a fixed current build, for embedding and tests.
#[derive(Clone)]
pub struct StaticHost {
  build: BuildDefinition,
  services: ServiceRegistry,
}

impl StaticHost {
  pub fn new(build: BuildDefinition, services: ServiceRegistry) -> Self {
    Self { build, services }
  }
}

impl BuildHost for StaticHost {
  fn current_build(&self) -> &BuildDefinition {
    &self.build
  }

  fn services(&self) -> &ServiceRegistry {
    &self.services
  }
}
