use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::Value;
use crate::isolate::IsolateKey;

/// Path of a build within the tree. The root build is `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildPath(String);

impl BuildPath {
  pub const ROOT: &'static str = ":";

  pub fn root() -> Self {
    Self(Self::ROOT.to_string())
  }

  /// Path of the included build named `name`.
  pub fn included(name: &str) -> Self {
    Self(format!(":{name}"))
  }

  pub fn parse(path: impl Into<String>) -> Self {
    Self(path.into())
  }

  pub fn is_root(&self) -> bool {
    self.0 == Self::ROOT
  }

  /// Last path segment, empty for the root build.
  pub fn name(&self) -> &str {
    self.0.rsplit(':').next().unwrap_or_default()
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for BuildPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Identity of one build in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDefinition {
  pub path: BuildPath,
  pub root_dir: PathBuf,
  /// Isolate the build's user types are declared in.
  pub isolate: IsolateKey,
}

impl BuildDefinition {
  pub fn root(root_dir: impl Into<PathBuf>, isolate: impl Into<IsolateKey>) -> Self {
    Self {
      path: BuildPath::root(),
      root_dir: root_dir.into(),
      isolate: isolate.into(),
    }
  }

  pub fn included(name: &str, root_dir: impl Into<PathBuf>, isolate: impl Into<IsolateKey>) -> Self {
    Self {
      path: BuildPath::included(name),
      root_dir: root_dir.into(),
      isolate: isolate.into(),
    }
  }

  pub fn is_root(&self) -> bool {
    self.path.is_root()
  }

  pub fn root_dir(&self) -> &Path {
    &self.root_dir
  }

  /// Name used in logs and segment labels.
  pub fn display_name(&self) -> String {
    if self.is_root() {
      "root build".to_string()
    } else {
      format!("build '{}'", self.path.name())
    }
  }
}

/// Configured state of one project.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectState {
  pub path: String,
  pub dir: PathBuf,
  pub state: Value,
}

impl ProjectState {
  pub fn new(path: impl Into<String>, dir: impl Into<PathBuf>, state: Value) -> Self {
    Self {
      path: path.into(),
      dir: dir.into(),
      state,
    }
  }
}

/// Identity of a unit of scheduled work, e.g. `:app:compile`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskRef(String);

impl TaskRef {
  pub fn new(path: impl Into<String>) -> Self {
    Self(path.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for TaskRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<&str> for TaskRef {
  fn from(path: &str) -> Self {
    Self::new(path)
  }
}

/// A scheduled unit of work with its dependencies and configured state.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkNode {
  pub task: TaskRef,
  pub dependencies: Vec<TaskRef>,
  pub state: Value,
}

impl WorkNode {
  pub fn new(task: impl Into<TaskRef>, state: Value) -> Self {
    Self {
      task: task.into(),
      dependencies: Vec::new(),
      state,
    }
  }

  pub fn depends_on(mut self, task: impl Into<TaskRef>) -> Self {
    self.dependencies.push(task.into());
    self
  }
}

/// A build with its configured projects and scheduled work.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfiguredBuild {
  pub definition: BuildDefinition,
  pub projects: Vec<ProjectState>,
  pub work: Vec<WorkNode>,
}

impl ConfiguredBuild {
  pub fn new(definition: BuildDefinition) -> Self {
    Self {
      definition,
      projects: Vec::new(),
      work: Vec::new(),
    }
  }

  pub fn with_project(mut self, project: ProjectState) -> Self {
    self.projects.push(project);
    self
  }

  pub fn with_work(mut self, node: WorkNode) -> Self {
    self.work.push(node);
    self
  }
}

/// The root build plus its included builds.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildTree {
  pub root: ConfiguredBuild,
  pub included: Vec<ConfiguredBuild>,
}

impl BuildTree {
  pub fn new(root: ConfiguredBuild) -> Self {
    Self {
      root,
      included: Vec::new(),
    }
  }

  pub fn with_included(mut self, build: ConfiguredBuild) -> Self {
    self.included.push(build);
    self
  }

  /// Definitions of every build, root first.
  pub fn definitions(&self) -> impl Iterator<Item = &BuildDefinition> {
    std::iter::once(&self.root.definition).chain(self.included.iter().map(|build| &build.definition))
  }

  pub fn build(&self, path: &BuildPath) -> Option<&ConfiguredBuild> {
    std::iter::once(&self.root)
      .chain(self.included.iter())
      .find(|build| &build.definition.path == path)
  }
}

/// Which work of each build the tree needs at execution time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredBuildTreeState {
  required: BTreeMap<BuildPath, BTreeSet<TaskRef>>,
}

impl StoredBuildTreeState {
  pub fn new() -> Self {
    Self::default()
  }

  /// Everything scheduled anywhere in `tree`.
  pub fn everything(tree: &BuildTree) -> Self {
    let mut state = Self::new();
    for build in std::iter::once(&tree.root).chain(tree.included.iter()) {
      for node in &build.work {
        state.require(&build.definition.path, node.task.clone());
      }
    }
    state
  }

  pub fn require(&mut self, build: &BuildPath, task: TaskRef) {
    self.required.entry(build.clone()).or_default().insert(task);
  }

  pub fn requires(&self, build: &BuildPath, task: &TaskRef) -> bool {
    self.required.get(build).is_some_and(|tasks| tasks.contains(task))
  }

  /// The work of `build` that the tree requires, in scheduling order.
  pub fn required_work<'a>(&self, build: &'a ConfiguredBuild) -> Vec<&'a WorkNode> {
    build
      .work
      .iter()
      .filter(|node| self.requires(&build.definition.path, &node.task))
      .collect()
  }
}
