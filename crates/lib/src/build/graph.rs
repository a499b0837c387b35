use std::collections::BTreeMap;

use super::types::{BuildDefinition, BuildPath, ConfiguredBuild, ProjectState, WorkNode};

/// Receives projects and scheduled work restored from a cache entry.
pub trait WorkGraph {
  fn add_projects(&mut self, build: &BuildDefinition, projects: Vec<ProjectState>);
  fn schedule(&mut self, build: &BuildDefinition, work: Vec<WorkNode>);
}

/// Materializes builds recorded in an entry that the process does not have.
pub trait BuildFactory {
  fn contains(&self, path: &BuildPath) -> bool;
  fn create_build(&mut self, definition: &BuildDefinition) -> Result<(), String>;
}

/// A [`WorkGraph`] that keeps everything it receives, per build.
#[derive(Debug, Clone, Default)]
pub struct RestoredWorkGraph {
  builds: BTreeMap<BuildPath, ConfiguredBuild>,
}

impl RestoredWorkGraph {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn build(&self, path: &BuildPath) -> Option<&ConfiguredBuild> {
    self.builds.get(path)
  }

  pub fn builds(&self) -> impl Iterator<Item = &ConfiguredBuild> {
    self.builds.values()
  }

  fn entry(&mut self, build: &BuildDefinition) -> &mut ConfiguredBuild {
    self
      .builds
      .entry(build.path.clone())
      .or_insert_with(|| ConfiguredBuild::new(build.clone()))
  }
}

impl WorkGraph for RestoredWorkGraph {
  fn add_projects(&mut self, build: &BuildDefinition, projects: Vec<ProjectState>) {
    self.entry(build).projects.extend(projects);
  }

  fn schedule(&mut self, build: &BuildDefinition, work: Vec<WorkNode>) {
    self.entry(build).work.extend(work);
  }
}

/// The builds known to the running process.
#[derive(Debug, Clone, Default)]
pub struct BuildRegistry {
  builds: BTreeMap<BuildPath, BuildDefinition>,
}

impl BuildRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_build(mut self, definition: BuildDefinition) -> Self {
    self.builds.insert(definition.path.clone(), definition);
    self
  }

  pub fn get(&self, path: &BuildPath) -> Option<&BuildDefinition> {
    self.builds.get(path)
  }

  pub fn len(&self) -> usize {
    self.builds.len()
  }

  pub fn is_empty(&self) -> bool {
    self.builds.is_empty()
  }
}

impl BuildFactory for BuildRegistry {
  fn contains(&self, path: &BuildPath) -> bool {
    self.builds.contains_key(path)
  }

  fn create_build(&mut self, definition: &BuildDefinition) -> Result<(), String> {
    if !definition.root_dir.is_absolute() {
      return Err(format!("root directory {} is not absolute", definition.root_dir.display()));
    }
    self.builds.insert(definition.path.clone(), definition.clone());
    Ok(())
  }
}
