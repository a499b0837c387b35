use std::fmt;

/// What went wrong with a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProblemKind {
  /// No codec accepts the value, or the claiming codec refused it.
  Unserializable,
  /// A sentinel was read where the value used to be.
  Unavailable,
  /// The recorded bean type is not declared in its isolate anymore.
  UnknownType,
  /// The bean constructor service could not rebuild the bean.
  ConstructionFailed,
  /// A referenced infrastructure service is not provided by the host.
  UnresolvedService,
}

impl ProblemKind {
  pub fn as_str(self) -> &'static str {
    match self {
      ProblemKind::Unserializable => "unserializable",
      ProblemKind::Unavailable => "unavailable",
      ProblemKind::UnknownType => "unknown-type",
      ProblemKind::ConstructionFailed => "construction-failed",
      ProblemKind::UnresolvedService => "unresolved-service",
    }
  }
}

impl fmt::Display for ProblemKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One step on the way from a segment's root to a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceFrame {
  Build(String),
  Project(String),
  Work(String),
  Model,
  Bean(String),
  Field(String),
  Element(usize),
  MapKey(usize),
  MapValue(usize),
  ConstructorArg(usize),
}

impl fmt::Display for TraceFrame {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TraceFrame::Build(path) => write!(f, "build `{path}`"),
      TraceFrame::Project(path) => write!(f, "project `{path}`"),
      TraceFrame::Work(path) => write!(f, "work `{path}`"),
      TraceFrame::Model => write!(f, "model"),
      TraceFrame::Bean(type_name) => write!(f, "bean `{type_name}`"),
      TraceFrame::Field(name) => write!(f, "field `{name}`"),
      TraceFrame::Element(index) => write!(f, "element {index}"),
      TraceFrame::MapKey(index) => write!(f, "key {index}"),
      TraceFrame::MapValue(index) => write!(f, "value {index}"),
      TraceFrame::ConstructorArg(index) => write!(f, "constructor argument {index}"),
    }
  }
}

/// Path of frames enclosing the value currently being written or read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyTrace(Vec<TraceFrame>);

impl PropertyTrace {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, frame: TraceFrame) {
    self.0.push(frame);
  }

  pub fn pop(&mut self) -> Option<TraceFrame> {
    self.0.pop()
  }

  pub fn frames(&self) -> &[TraceFrame] {
    &self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn depth(&self) -> usize {
    self.0.len()
  }
}

impl fmt::Display for PropertyTrace {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, frame) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str(" > ")?;
      }
      write!(f, "{frame}")?;
    }
    Ok(())
  }
}

/// A recorded failure to write or read one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
  pub kind: ProblemKind,
  /// Type of the offending value, when known.
  pub type_name: Option<String>,
  /// Enclosing path, absent for values at the root of a segment.
  pub trace: Option<PropertyTrace>,
  pub cause: String,
}

impl Problem {
  pub fn new(kind: ProblemKind, cause: impl Into<String>) -> Self {
    Self {
      kind,
      type_name: None,
      trace: None,
      cause: cause.into(),
    }
  }

  pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
    self.type_name = Some(type_name.into());
    self
  }

  /// Attach `trace` unless it is empty.
  pub fn at(mut self, trace: &PropertyTrace) -> Self {
    self.trace = (!trace.is_empty()).then(|| trace.clone());
    self
  }
}

impl fmt::Display for Problem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.kind)?;
    if let Some(type_name) = &self.type_name {
      write!(f, " `{type_name}`")?;
    }
    write!(f, ": {}", self.cause)?;
    if let Some(trace) = &self.trace {
      write!(f, " (at {trace})")?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn trace_renders_as_path() {
    let mut trace = PropertyTrace::new();
    trace.push(TraceFrame::Build(":".to_string()));
    trace.push(TraceFrame::Project(":app".to_string()));
    trace.push(TraceFrame::Field("count".to_string()));
    assert_eq!(trace.to_string(), "build `:` > project `:app` > field `count`");
  }

  #[test]
  fn empty_trace_is_not_attached() {
    let problem = Problem::new(ProblemKind::Unserializable, "boom").at(&PropertyTrace::new());
    assert!(problem.trace.is_none());
  }

  #[test]
  fn problem_display_includes_type_and_trace() {
    let mut trace = PropertyTrace::new();
    trace.push(TraceFrame::Model);
    let problem = Problem::new(ProblemKind::Unserializable, "no codec")
      .with_type("std::net::TcpStream")
      .at(&trace);
    assert_eq!(
      problem.to_string(),
      "unserializable `std::net::TcpStream`: no codec (at model)"
    );
  }
}
