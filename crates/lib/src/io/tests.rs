use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use super::*;
use crate::bean::{Bean, BeanRef, TypeDescriptor};
use crate::build::{BuildPath, BuildRegistry, ProjectState, RestoredWorkGraph, TaskRef};
use crate::entry::{CacheEntry, EntryKey, EntryKeyInputs, EntryStore, StateType};
use crate::host::{ServiceRegistry, StaticHost};
use crate::isolate::{IsolateRegistry, IsolateTypes};
use crate::problems::ProblemReport;
use crate::stream::Encoder;

fn isolates() -> IsolateRegistry {
  let types = || {
    IsolateTypes::new()
      .declare(TypeDescriptor::new("Settings").default_constructible())
      .declare(TypeDescriptor::new("Node").default_constructible())
  };
  IsolateRegistry::new()
    .register("root", types())
    .register("other", types())
    .register("lib@1", types())
}

fn root_build(isolate: &str) -> BuildDefinition {
  BuildDefinition::root("/work", isolate)
}

struct Fixture {
  _temp: TempDir,
  config: CacheConfig,
  entry: CacheEntry,
  report: Arc<ProblemReport>,
}

impl Fixture {
  fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let config = CacheConfig::new(temp.path());
    let key = EntryKey::for_inputs(&EntryKeyInputs::new("/work").with_task("build")).unwrap();
    let entry = EntryStore::from_config(&config).entry(&key);
    Self {
      _temp: temp,
      config,
      entry,
      report: Arc::new(ProblemReport::default()),
    }
  }

  fn io(&self) -> CacheIo {
    self.io_for(root_build("root"))
  }

  fn io_for(&self, build: BuildDefinition) -> CacheIo {
    let host = StaticHost::new(build, ServiceRegistry::with_defaults(isolates()));
    CacheIo::new(Arc::new(host), self.report.clone(), &self.config).unwrap()
  }
}

fn settings() -> Value {
  Value::bean(
    Bean::new("Settings")
      .with_field("count", Value::Int(42))
      .with_field("name", Value::from("x")),
  )
}

fn tree() -> BuildTree {
  let shared = BeanRef::new(Bean::new("Node").with_field("name", Value::from("shared")));
  let root = ConfiguredBuild::new(root_build("root"))
    .with_project(ProjectState::new(
      ":",
      "/work",
      Value::map([("group", Value::from("org.example"))]),
    ))
    .with_project(ProjectState::new(":app", "/work/app", Value::Bean(shared.clone())))
    .with_work(WorkNode::new(":app:compile", Value::Bean(shared)))
    .with_work(WorkNode::new(":app:test", Value::Null).depends_on(":app:compile"));
  let lib = ConfiguredBuild::new(BuildDefinition::included("lib", "/libs/lib", "lib@1"))
    .with_project(ProjectState::new(":lib", "/libs/lib", Value::Int(3)))
    .with_work(WorkNode::new(":lib:jar", Value::from("jar")))
    .with_work(WorkNode::new(":lib:docs", Value::from("docs")));
  BuildTree::new(root).with_included(lib)
}

#[test]
fn entry_details_round_trip_in_order() {
  let fixture = Fixture::new();
  let io = fixture.io();
  let file = fixture.entry.entry_details();
  let builds = vec![
    root_build("root"),
    BuildDefinition::included("a", "/a", "lib@1"),
    BuildDefinition::included("b", "/b", "lib@1"),
    BuildDefinition::included("a-again", "/a", "lib@1"),
  ];

  io.write_cache_entry_details(&builds, &file).unwrap();

  assert_eq!(
    io.read_cache_entry_details(&file),
    vec![PathBuf::from("/a"), PathBuf::from("/b")]
  );
}

#[cfg(unix)]
#[test]
fn entry_details_keep_non_utf8_directories() {
  use std::ffi::OsString;
  use std::os::unix::ffi::OsStringExt;

  let fixture = Fixture::new();
  let io = fixture.io();
  let file = fixture.entry.entry_details();
  let dir = PathBuf::from(OsString::from_vec(b"/builds/caf\xe9".to_vec()));
  let builds = vec![root_build("root"), BuildDefinition::included("cafe", dir.clone(), "lib@1")];

  io.write_cache_entry_details(&builds, &file).unwrap();

  assert_eq!(io.read_cache_entry_details(&file), vec![dir]);
  assert!(fixture.report.is_empty());
}

#[test]
fn deleted_entry_details_read_as_empty() {
  let fixture = Fixture::new();
  let io = fixture.io();
  let file = fixture.entry.entry_details();
  io.write_cache_entry_details(&[BuildDefinition::included("a", "/a", "lib@1")], &file)
    .unwrap();

  fs::remove_file(file.path()).unwrap();

  assert!(io.read_cache_entry_details(&file).is_empty());
}

#[test]
fn corrupt_entry_details_read_as_empty() {
  let fixture = Fixture::new();
  let io = fixture.io();
  let file = fixture.entry.entry_details();
  io.write_cache_entry_details(&[BuildDefinition::included("a", "/a", "lib@1")], &file)
    .unwrap();

  let bytes = fs::read(file.path()).unwrap();
  fs::write(file.path(), &bytes[..3]).unwrap();
  assert!(io.read_cache_entry_details(&file).is_empty());

  fs::write(file.path(), b"definitely not a segment").unwrap();
  assert!(io.read_cache_entry_details(&file).is_empty());
}

#[test]
fn model_round_trips_under_its_isolate() {
  let fixture = Fixture::new();
  let io = fixture.io();
  let file = fixture.entry.model();

  io.write_model(&settings(), &file).unwrap();

  assert_eq!(io.read_model(&file).unwrap(), settings());
  assert!(fixture.report.is_empty());
}

#[test]
fn model_read_under_another_isolate_is_a_contract_violation() {
  let fixture = Fixture::new();
  let file = fixture.entry.model();
  fixture.io().write_model(&settings(), &file).unwrap();

  let error = fixture.io_for(root_build("other")).read_model(&file).unwrap_err();

  assert!(matches!(
    error.contract_violation(),
    Some(ContractViolation::IsolateMismatch { expected, found }) if expected == "other" && found == "root"
  ));
  assert!(error.to_string().contains("model.bin"));
}

#[test]
fn null_model_is_a_contract_violation() {
  let fixture = Fixture::new();
  let io = fixture.io();
  let file = fixture.entry.model();
  io.write_model(&Value::Null, &file).unwrap();

  let error = io.read_model(&file).unwrap_err();
  assert!(matches!(error.contract_violation(), Some(ContractViolation::NullModel)));
}

#[test]
fn root_build_state_round_trips() {
  let fixture = Fixture::new();
  let io = fixture.io();
  let tree = tree();
  let file = fixture.entry.root_build_state();
  io.write_root_build_state(&file, &tree).unwrap();

  let mut graph = RestoredWorkGraph::new();
  let mut builds = BuildRegistry::new().with_build(root_build("root"));
  let restored = io.read_root_build_state(&file, &mut graph, &mut builds).unwrap();

  assert_eq!(restored.root, tree.root.definition);
  assert_eq!(restored.included, vec![tree.included[0].definition.clone()]);
  assert!(builds.contains(&BuildPath::included("lib")));

  let root = graph.build(&BuildPath::root()).unwrap();
  assert_eq!(root.projects, tree.root.projects);
  assert_eq!(root.work, tree.root.work);
  assert_eq!(root.work[1].dependencies, vec![TaskRef::new(":app:compile")]);

  let project_bean = root.projects[1].state.as_bean().unwrap();
  let work_bean = root.work[0].state.as_bean().unwrap();
  assert!(project_bean.ptr_eq(work_bean));
  assert!(fixture.report.is_empty());
}

#[test]
fn included_builds_that_cannot_be_created_fail_the_read() {
  let fixture = Fixture::new();
  let io = fixture.io();
  let tree = BuildTree::new(ConfiguredBuild::new(root_build("root")))
    .with_included(ConfiguredBuild::new(BuildDefinition::included("rel", "relative/dir", "lib@1")));
  let file = fixture.entry.root_build_state();
  io.write_root_build_state(&file, &tree).unwrap();

  let mut graph = RestoredWorkGraph::new();
  let mut builds = BuildRegistry::new();
  let error = io.read_root_build_state(&file, &mut graph, &mut builds).unwrap_err();

  assert!(matches!(error.root_cause(), CacheError::BuildCreation { build, .. } if build == ":rel"));
}

#[test]
fn included_build_state_keeps_only_required_work() {
  let fixture = Fixture::new();
  let io = fixture.io();
  let tree = tree();
  let lib = &tree.included[0];
  let file = fixture.entry.included_build_state("lib");

  let mut required = StoredBuildTreeState::new();
  required.require(&lib.definition.path, TaskRef::new(":lib:jar"));
  io.write_included_build_state(&file, lib, &required).unwrap();

  let restored = io.read_included_build_state(&file, &lib.definition).unwrap();
  assert_eq!(restored.definition, lib.definition);
  assert_eq!(restored.projects, lib.projects);
  assert_eq!(restored.work, vec![lib.work[0].clone()]);
}

#[test]
fn included_build_state_is_checked_against_the_target_build() {
  let fixture = Fixture::new();
  let io = fixture.io();
  let tree = tree();
  let lib = &tree.included[0];
  let file = fixture.entry.included_build_state("lib");
  io.write_included_build_state(&file, lib, &StoredBuildTreeState::everything(&tree))
    .unwrap();

  let other = BuildDefinition::included("other", "/libs/other", "lib@1");
  let error = io.read_included_build_state(&file, &other).unwrap_err();

  assert!(matches!(
    error.contract_violation(),
    Some(ContractViolation::BuildMismatch { expected, found }) if expected == ":other" && found == ":lib"
  ));
}

#[test]
fn cache_io_is_shareable_between_threads() {
  fn assert_send_sync<T: Send + Sync>() {}
  assert_send_sync::<CacheIo>();
}

#[test]
fn segments_are_written_from_parallel_threads() {
  let fixture = Fixture::new();
  let io = Arc::new(fixture.io());
  let root_file = fixture.entry.root_build_state();
  let lib_file = fixture.entry.included_build_state("lib");

  // Bean graphs are not `Send`, so every thread configures its own tree.
  std::thread::scope(|scope| {
    scope.spawn(|| {
      io.write_root_build_state(&root_file, &tree()).unwrap();
    });
    scope.spawn(|| {
      let tree = tree();
      let required = StoredBuildTreeState::everything(&tree);
      io.write_included_build_state(&lib_file, &tree.included[0], &required)
        .unwrap();
    });
  });

  let expected = tree();
  let mut graph = RestoredWorkGraph::new();
  let mut builds = BuildRegistry::new().with_build(root_build("root"));
  let restored = io.read_root_build_state(&root_file, &mut graph, &mut builds).unwrap();
  assert_eq!(restored.included, vec![expected.included[0].definition.clone()]);
  assert_eq!(graph.build(&BuildPath::root()).unwrap().work, expected.root.work);

  let lib = io
    .read_included_build_state(&lib_file, &expected.included[0].definition)
    .unwrap();
  assert_eq!(lib.work, expected.included[0].work);
  assert!(fixture.report.is_empty());
}

#[test]
fn unserializable_values_degrade_gracefully() {
  let fixture = Fixture::new();
  let io = fixture.io();
  let mut tree = tree();
  tree.root.projects[0].state = Value::map([
    ("group", Value::from("org.example")),
    ("socket", Value::opaque("std::net::TcpStream")),
  ]);
  let file = fixture.entry.root_build_state();

  io.write_root_build_state(&file, &tree).unwrap();

  let reported = fixture.report.problems();
  assert_eq!(reported.len(), 1);
  assert_eq!(reported[0].profile, "root build state");
  assert_eq!(
    reported[0].problem.trace.as_ref().unwrap().to_string(),
    "build `:` > project `:` > value 1"
  );

  let mut graph = RestoredWorkGraph::new();
  let mut builds = BuildRegistry::new();
  io.read_root_build_state(&file, &mut graph, &mut builds).unwrap();

  let root = graph.build(&BuildPath::root()).unwrap();
  let state = &root.projects[0].state;
  assert_eq!(state.get("group"), Some(&Value::from("org.example")));
  assert!(state.get("socket").is_some_and(Value::is_missing));
  assert_eq!(root.projects[1].state, tree.root.projects[1].state);
  assert_eq!(root.work, tree.root.work);
  assert!(fixture.report.should_invalidate());
}

#[test]
fn segments_are_independent() {
  let fixture = Fixture::new();
  let io = fixture.io();
  let tree = tree();
  let shared = tree.root.work[0].state.clone();

  io.write_model(&Value::List(vec![shared.clone(), shared]), &fixture.entry.model())
    .unwrap();
  io.write_root_build_state(&fixture.entry.root_build_state(), &tree).unwrap();
  fs::remove_file(fixture.entry.root_build_state().path()).unwrap();

  let model = io.read_model(&fixture.entry.model()).unwrap();
  let items = model.as_list().unwrap();
  assert!(items[0].as_bean().unwrap().ptr_eq(items[1].as_bean().unwrap()));
  assert_eq!(items[0].as_bean().unwrap().borrow().field("name"), Some(&Value::from("shared")));
}

#[test]
fn fingerprint_mismatch_rejects_the_segment() {
  let fixture = Fixture::new();
  let io = fixture.io();
  let file = fixture.entry.model();

  let mut pending = file.create().unwrap();
  let mut encoder = Encoder::new(&mut pending);
  SegmentHeader::new(&StateType::Model, "0000000000000000")
    .write_to(&mut encoder)
    .unwrap();
  drop(encoder);
  pending.commit().unwrap();

  let error = io.read_model(&file).unwrap_err();
  assert!(matches!(&error, CacheError::IncompatibleFormat { reason, .. } if reason.contains("fingerprint")));
}

#[test]
fn segment_type_is_checked() {
  let fixture = Fixture::new();
  let io = fixture.io();
  io.write_model(&settings(), &fixture.entry.model()).unwrap();
  fs::copy(fixture.entry.model().path(), fixture.entry.root_build_state().path()).unwrap();

  let mut graph = RestoredWorkGraph::new();
  let mut builds = BuildRegistry::new();
  let error = io
    .read_root_build_state(&fixture.entry.root_build_state(), &mut graph, &mut builds)
    .unwrap_err();
  assert!(matches!(error, CacheError::IncompatibleFormat { .. }));
}

#[test]
fn failed_writes_leave_no_segment() {
  let fixture = Fixture::new();
  let file = fixture.entry.model();
  let io = fixture.io_for(BuildDefinition::root("/work", "unregistered"));

  let error = io.write_model(&settings(), &file).unwrap_err();

  assert!(matches!(
    error.contract_violation(),
    Some(ContractViolation::UnknownIsolate { .. })
  ));
  assert!(!file.can_read());
  assert_eq!(fs::read_dir(fixture.entry.dir()).unwrap().count(), 0);
}

#[test]
fn failed_overwrite_keeps_previous_segment() {
  let fixture = Fixture::new();
  let file = fixture.entry.model();
  fixture.io().write_model(&settings(), &file).unwrap();

  let broken = fixture.io_for(BuildDefinition::root("/work", "unregistered"));
  assert!(broken.write_model(&Value::Int(1), &file).is_err());

  assert_eq!(fixture.io().read_model(&file).unwrap(), settings());
  assert_eq!(fs::read_dir(fixture.entry.dir()).unwrap().count(), 1);
}

#[test]
fn low_level_contexts_share_the_registry() {
  let fixture = Fixture::new();
  let io = fixture.io();

  let mut buf = Vec::new();
  {
    let (mut ctx, codecs) = io.writer_context_for(&mut buf, "custom");
    assert_eq!(codecs.fingerprint(), io.codecs().fingerprint());
    ctx.write(&Value::from("hello")).unwrap();
    ctx.finish().unwrap();
  }

  let value = io.with_reader_context_for(&buf[..], "custom", |ctx| ctx.read()).unwrap();
  assert_eq!(value, Value::from("hello"));
}

#[test]
fn trace_config_installs_a_tracer() {
  let fixture = Fixture::new();
  let config = fixture.config.clone().with_trace(true);
  let host = StaticHost::new(root_build("root"), ServiceRegistry::with_defaults(isolates()));
  let io = CacheIo::new(Arc::new(host), fixture.report.clone(), &config).unwrap();

  let (ctx, _) = io.writer_context_for(Vec::new(), "traced");
  assert!(ctx.has_tracer());
}

#[test]
#[tracing_test::traced_test]
fn writes_are_logged() {
  let fixture = Fixture::new();
  fixture.io().write_model(&settings(), &fixture.entry.model()).unwrap();

  assert!(logs_contain("wrote cache segment"));
  assert!(logs_contain("bean `Settings`"));
}
