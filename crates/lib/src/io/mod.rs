//! Cache entry orchestration.
//!
//! [`CacheIo`] reads and writes the segments of one cache entry: entry
//! details, root build state, one state segment per included build, and the
//! model. Each operation opens its own stream, writes or checks the segment
//! header, runs the body inside a fresh context and hands the collected
//! problems to the host's [`ProblemsListener`]. Writes go to a temp file
//! that is renamed into place only once the whole segment was flushed.

mod state;

#[cfg(test)]
mod tests;

use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{Level, debug, info, warn};

use crate::build::{
  BuildDefinition, BuildFactory, BuildTree, ConfiguredBuild, ProjectState, StoredBuildTreeState, WorkGraph, WorkNode,
};
use crate::codec::{CodecRegistry, Value};
use crate::config::CacheConfig;
use crate::context::{ReadContext, WriteContext};
use crate::entry::{SegmentHeader, StateFile};
use crate::error::{CacheError, ContractViolation};
use crate::host::BuildHost;
use crate::problems::{Problem, ProblemsListener, TraceFrame};
use crate::stream::StreamError;
use crate::trace::LoggingTracer;

const ENTRY_DETAILS_PROFILE: &str = "entry details";
const MODEL_PROFILE: &str = "model";

/// Build definitions restored from a root build state segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredRoot {
  pub root: BuildDefinition,
  /// Included builds in recorded order. Each has its own state segment.
  pub included: Vec<BuildDefinition>,
}

/// Reads and writes the segments of cache entries.
pub struct CacheIo {
  host: Arc<dyn BuildHost>,
  codecs: Arc<CodecRegistry>,
  problems: Arc<dyn ProblemsListener>,
  trace: bool,
}

impl CacheIo {
  /// Assemble the codec registry from the host's services.
  pub fn new(
    host: Arc<dyn BuildHost>,
    problems: Arc<dyn ProblemsListener>,
    config: &CacheConfig,
  ) -> Result<Self, CacheError> {
    let codecs = Arc::new(CodecRegistry::from_services(host.services())?);
    debug!(fingerprint = %codecs.fingerprint(), "codec registry ready");
    Ok(Self {
      host,
      codecs,
      problems,
      trace: config.trace,
    })
  }

  pub fn codecs(&self) -> &Arc<CodecRegistry> {
    &self.codecs
  }

  /// Record the root directories of all included builds.
  ///
  /// The root build is skipped and duplicates keep their first position.
  pub fn write_cache_entry_details<'b>(
    &self,
    builds: impl IntoIterator<Item = &'b BuildDefinition>,
    file: &StateFile,
  ) -> Result<(), CacheError> {
    let mut root_dirs: Vec<PathBuf> = Vec::new();
    for build in builds {
      if !build.is_root() && !root_dirs.contains(&build.root_dir) {
        root_dirs.push(build.root_dir.clone());
      }
    }

    self.write_state(file, ENTRY_DETAILS_PROFILE, |ctx| {
      ctx.write_collection(&root_dirs, |ctx, dir| ctx.write_file(dir))
    })
  }

  /// Root directories recorded by [`write_cache_entry_details`](Self::write_cache_entry_details).
  ///
  /// Never fails: a missing, unreadable or incompatible segment yields an
  /// empty list, which hosts treat as an invalid entry.
  pub fn read_cache_entry_details(&self, file: &StateFile) -> Vec<PathBuf> {
    if !file.can_read() {
      debug!(path = %file.path().display(), "no entry details");
      return Vec::new();
    }
    match self.read_state(file, ENTRY_DETAILS_PROFILE, |ctx| ctx.read_list(|ctx| ctx.read_file())) {
      Ok(root_dirs) => root_dirs,
      Err(e) => {
        warn!(path = %file.path().display(), error = %e, "ignoring unreadable entry details");
        Vec::new()
      }
    }
  }

  /// Write the root build definition, the included build definitions, and
  /// the root build's projects and work under the root build's isolate.
  pub fn write_root_build_state(&self, file: &StateFile, tree: &BuildTree) -> Result<(), CacheError> {
    let root = &tree.root;
    let included: Vec<&BuildDefinition> = tree.included.iter().map(|build| &build.definition).collect();
    let work: Vec<&WorkNode> = root.work.iter().collect();

    self.write_state(file, &state_profile(&root.definition), |ctx| {
      state::write_definition(ctx, &root.definition)?;
      ctx.write_collection(&included, |ctx, definition| state::write_definition(ctx, definition))?;
      ctx.with_isolate(&root.definition.isolate, |ctx| {
        ctx.frame(TraceFrame::Build(root.definition.path.to_string()), |ctx| {
          state::write_projects(ctx, &root.projects)?;
          state::write_work(ctx, &work)
        })
      })
    })
  }

  /// Restore the root build into `graph`.
  ///
  /// Included builds the process does not know yet are created through
  /// `factory` before any project state is read.
  pub fn read_root_build_state(
    &self,
    file: &StateFile,
    graph: &mut dyn WorkGraph,
    factory: &mut dyn BuildFactory,
  ) -> Result<RestoredRoot, CacheError> {
    let current = self.host.current_build().clone();

    self.read_state(file, &state_profile(&current), |ctx| {
      let root = state::read_definition(ctx)?;
      check_build(&current, &root)?;

      let included = ctx.read_list(state::read_definition)?;
      for definition in &included {
        if factory.contains(&definition.path) {
          continue;
        }
        factory
          .create_build(definition)
          .map_err(|reason| CacheError::BuildCreation {
            build: definition.path.to_string(),
            reason,
          })?;
        debug!(build = %definition.path, "created included build from cache entry");
      }

      let (projects, work) = ctx.with_isolate(&current.isolate, |ctx| {
        ctx.frame(
          TraceFrame::Build(root.path.to_string()),
          |ctx| -> Result<(Vec<ProjectState>, Vec<WorkNode>), CacheError> {
            Ok((state::read_projects(ctx)?, state::read_work(ctx)?))
          },
        )
      })?;
      graph.add_projects(&root, projects);
      graph.schedule(&root, work);

      Ok(RestoredRoot { root, included })
    })
  }

  /// Write one included build's projects and the work `tree_state` requires
  /// of it, under that build's isolate.
  pub fn write_included_build_state(
    &self,
    file: &StateFile,
    build: &ConfiguredBuild,
    tree_state: &StoredBuildTreeState,
  ) -> Result<(), CacheError> {
    let work = tree_state.required_work(build);

    self.write_state(file, &state_profile(&build.definition), |ctx| {
      state::write_definition(ctx, &build.definition)?;
      ctx.with_isolate(&build.definition.isolate, |ctx| {
        ctx.frame(TraceFrame::Build(build.definition.path.to_string()), |ctx| {
          state::write_projects(ctx, &build.projects)?;
          state::write_work(ctx, &work)
        })
      })
    })
  }

  /// Restore the projects and work of `build`.
  pub fn read_included_build_state(
    &self,
    file: &StateFile,
    build: &BuildDefinition,
  ) -> Result<ConfiguredBuild, CacheError> {
    self.read_state(file, &state_profile(build), |ctx| {
      let recorded = state::read_definition(ctx)?;
      check_build(build, &recorded)?;

      ctx.with_isolate(&build.isolate, |ctx| {
        ctx.frame(TraceFrame::Build(build.path.to_string()), |ctx| -> Result<ConfiguredBuild, CacheError> {
          Ok(ConfiguredBuild {
            definition: build.clone(),
            projects: state::read_projects(ctx)?,
            work: state::read_work(ctx)?,
          })
        })
      })
    })
  }

  /// Write a single value under the current build's isolate.
  pub fn write_model(&self, model: &Value, file: &StateFile) -> Result<(), CacheError> {
    let isolate = self.host.current_build().isolate.clone();
    self.write_state(file, MODEL_PROFILE, |ctx| {
      ctx.with_isolate(&isolate, |ctx| ctx.frame(TraceFrame::Model, |ctx| ctx.write(model)))
    })
  }

  /// Read the value written by [`write_model`](Self::write_model).
  pub fn read_model(&self, file: &StateFile) -> Result<Value, CacheError> {
    let isolate = self.host.current_build().isolate.clone();
    self.read_state(file, MODEL_PROFILE, |ctx| {
      let model = ctx.with_isolate(&isolate, |ctx| ctx.frame(TraceFrame::Model, |ctx| ctx.read()))?;
      match model {
        Value::Null => Err(ContractViolation::NullModel.into()),
        model => Ok(model),
      }
    })
  }

  /// A write context over `sink` together with the registry it encodes with.
  ///
  /// A [`LoggingTracer`] is installed when debug logging is enabled or
  /// tracing was requested in the configuration.
  pub fn writer_context_for<'a, W: Write + 'a>(
    &self,
    sink: W,
    profile: &str,
  ) -> (WriteContext<'a>, Arc<CodecRegistry>) {
    let mut ctx = WriteContext::new(sink, self.codecs.clone(), profile);
    if self.trace || tracing::enabled!(Level::DEBUG) {
      ctx.set_tracer(Some(Box::new(LoggingTracer::new(profile))));
    }
    (ctx, self.codecs.clone())
  }

  /// Run `action` over a read context on `source`, reporting its problems.
  pub fn with_reader_context_for<R: Read, T>(
    &self,
    source: R,
    profile: &str,
    action: impl FnOnce(&mut ReadContext<'_>) -> Result<T, CacheError>,
  ) -> Result<T, CacheError> {
    let mut ctx = ReadContext::new(source, self.codecs.clone(), profile);
    let result = action(&mut ctx);
    self.report(profile, ctx.take_problems());
    result
  }

  fn write_state<T>(
    &self,
    file: &StateFile,
    profile: &str,
    action: impl FnOnce(&mut WriteContext<'_>) -> Result<T, CacheError>,
  ) -> Result<T, CacheError> {
    let mut pending = file.create()?;

    let result = {
      let (mut ctx, codecs) = self.writer_context_for(BufWriter::new(pending.writer()), profile);
      let header = SegmentHeader::new(file.state_type(), codecs.fingerprint());
      let result = header
        .write_to(ctx.encoder())
        .map_err(CacheError::from)
        .and_then(|()| action(&mut ctx))
        .and_then(|value| ctx.flush().map(|()| value));
      self.report(profile, ctx.take_problems());
      result.map(|value| (value, ctx.position()))
    };

    let (value, bytes) = result.map_err(|e| e.in_segment(file.path()))?;
    pending.commit()?;
    info!(profile = %profile, path = %file.path().display(), bytes, "wrote cache segment");
    Ok(value)
  }

  fn read_state<T>(
    &self,
    file: &StateFile,
    profile: &str,
    action: impl FnOnce(&mut ReadContext<'_>) -> Result<T, CacheError>,
  ) -> Result<T, CacheError> {
    let reader = file.open()?;
    let expected = SegmentHeader::new(file.state_type(), self.codecs.fingerprint());

    self
      .with_reader_context_for(reader, profile, |ctx| {
        check_header(ctx, file, &expected)?;
        action(ctx)
      })
      .map_err(|e| e.in_segment(file.path()))
  }

  fn report(&self, profile: &str, problems: Vec<Problem>) {
    if !problems.is_empty() {
      self.problems.on_problems(profile, problems);
    }
  }
}

fn state_profile(build: &BuildDefinition) -> String {
  format!("{} state", build.display_name())
}

fn check_build(expected: &BuildDefinition, recorded: &BuildDefinition) -> Result<(), CacheError> {
  if expected.path != recorded.path {
    return Err(
      ContractViolation::BuildMismatch {
        expected: expected.path.to_string(),
        found: recorded.path.to_string(),
      }
      .into(),
    );
  }
  Ok(())
}

fn check_header(ctx: &mut ReadContext<'_>, file: &StateFile, expected: &SegmentHeader) -> Result<(), CacheError> {
  let incompatible = |reason: String| CacheError::IncompatibleFormat {
    path: file.path().to_path_buf(),
    reason,
  };
  match SegmentHeader::read_from(ctx.decoder()) {
    Ok(Some(header)) => match header.incompatibility(expected) {
      Some(reason) => Err(incompatible(reason)),
      None => Ok(()),
    },
    Ok(None) => Err(incompatible("not a cache segment".to_string())),
    Err(StreamError::UnexpectedEof { .. }) => Err(incompatible("truncated segment header".to_string())),
    Err(e) => Err(e.into()),
  }
}
