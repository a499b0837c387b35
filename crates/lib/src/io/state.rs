//! Layout of build definitions, projects and scheduled work in a segment.

use crate::build::{BuildDefinition, BuildPath, ProjectState, TaskRef, WorkNode};
use crate::context::{ReadContext, WriteContext};
use crate::error::CacheError;
use crate::isolate::IsolateKey;
use crate::problems::TraceFrame;

pub(crate) fn write_definition(ctx: &mut WriteContext<'_>, definition: &BuildDefinition) -> Result<(), CacheError> {
  ctx.write_str(definition.path.as_str())?;
  ctx.write_file(&definition.root_dir)?;
  ctx.write_str(definition.isolate.as_str())
}

pub(crate) fn read_definition(ctx: &mut ReadContext<'_>) -> Result<BuildDefinition, CacheError> {
  Ok(BuildDefinition {
    path: BuildPath::parse(ctx.read_str()?),
    root_dir: ctx.read_file()?,
    isolate: IsolateKey::new(ctx.read_str()?),
  })
}

pub(crate) fn write_projects(ctx: &mut WriteContext<'_>, projects: &[ProjectState]) -> Result<(), CacheError> {
  ctx.write_collection(projects, |ctx, project| {
    ctx.frame(TraceFrame::Project(project.path.clone()), |ctx| {
      ctx.write_str(&project.path)?;
      ctx.write_file(&project.dir)?;
      ctx.write(&project.state)
    })
  })
}

pub(crate) fn read_projects(ctx: &mut ReadContext<'_>) -> Result<Vec<ProjectState>, CacheError> {
  ctx.read_list(|ctx| {
    let path = ctx.read_str()?;
    ctx.frame(TraceFrame::Project(path.clone()), |ctx| -> Result<ProjectState, CacheError> {
      let dir = ctx.read_file()?;
      let state = ctx.read()?;
      Ok(ProjectState { path, dir, state })
    })
  })
}

pub(crate) fn write_work(ctx: &mut WriteContext<'_>, work: &[&WorkNode]) -> Result<(), CacheError> {
  ctx.write_collection(work, |ctx, node| {
    ctx.frame(TraceFrame::Work(node.task.to_string()), |ctx| {
      ctx.write_str(node.task.as_str())?;
      ctx.write_collection(&node.dependencies, |ctx, dependency| ctx.write_str(dependency.as_str()))?;
      ctx.write(&node.state)
    })
  })
}

pub(crate) fn read_work(ctx: &mut ReadContext<'_>) -> Result<Vec<WorkNode>, CacheError> {
  ctx.read_list(|ctx| {
    let task = TaskRef::new(ctx.read_str()?);
    ctx.frame(TraceFrame::Work(task.to_string()), |ctx| -> Result<WorkNode, CacheError> {
      let dependencies = ctx.read_list(|ctx| Ok(TaskRef::new(ctx.read_str()?)))?;
      let state = ctx.read()?;
      Ok(WorkNode {
        task,
        dependencies,
        state,
      })
    })
  })
}
