//! Byte-offset tracing for written segments.
//!
//! Every logical frame a write context enters (build, project, work node,
//! bean, field, ...) is reported to the installed [`Tracer`] together with the
//! encoder position on entry and exit. This is how oversized entries get
//! diagnosed: the frames with the largest byte spans are the culprits.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::problems::PropertyTrace;

/// Receives frame boundaries during a write.
pub trait Tracer {
  fn open(&mut self, path: &PropertyTrace, position: u64);
  fn close(&mut self, path: &PropertyTrace, position: u64);
}

/// Emits one `debug` event per frame boundary.
pub struct LoggingTracer {
  profile: String,
  starts: Vec<u64>,
}

impl LoggingTracer {
  pub fn new(profile: impl Into<String>) -> Self {
    Self {
      profile: profile.into(),
      starts: Vec::new(),
    }
  }
}

impl Tracer for LoggingTracer {
  fn open(&mut self, path: &PropertyTrace, position: u64) {
    self.starts.push(position);
    debug!(profile = %self.profile, offset = position, "{}", path);
  }

  fn close(&mut self, path: &PropertyTrace, position: u64) {
    let start = self.starts.pop().unwrap_or(position);
    debug!(
      profile = %self.profile,
      offset = position,
      bytes = position.saturating_sub(start),
      "{} done",
      path
    );
  }
}

/// One closed frame and the bytes it spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
  pub path: String,
  pub start: u64,
  pub end: u64,
}

impl TraceRecord {
  pub fn len(&self) -> u64 {
    self.end.saturating_sub(self.start)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Keeps every closed frame in memory.
///
/// Clones share their records, so a caller can keep one handle and install
/// another in a write context.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
  records: Rc<RefCell<Vec<TraceRecord>>>,
  starts: Vec<u64>,
}

impl RecordingTracer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Records in the order frames closed.
  pub fn records(&self) -> Vec<TraceRecord> {
    self.records.borrow().clone()
  }

  /// The `n` largest frames, biggest first.
  pub fn largest(&self, n: usize) -> Vec<TraceRecord> {
    let mut records = self.records();
    records.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.start.cmp(&b.start)));
    records.truncate(n);
    records
  }
}

impl Tracer for RecordingTracer {
  fn open(&mut self, _path: &PropertyTrace, position: u64) {
    self.starts.push(position);
  }

  fn close(&mut self, path: &PropertyTrace, position: u64) {
    let start = self.starts.pop().unwrap_or(position);
    self.records.borrow_mut().push(TraceRecord {
      path: path.to_string(),
      start,
      end: position,
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::problems::TraceFrame;

  fn path(frames: &[TraceFrame]) -> PropertyTrace {
    let mut trace = PropertyTrace::new();
    for frame in frames {
      trace.push(frame.clone());
    }
    trace
  }

  #[test]
  fn recording_tracer_measures_nested_frames() {
    let handle = RecordingTracer::new();
    let mut tracer = handle.clone();

    let outer = path(&[TraceFrame::Model]);
    let inner = path(&[TraceFrame::Model, TraceFrame::Field("name".to_string())]);
    tracer.open(&outer, 10);
    tracer.open(&inner, 12);
    tracer.close(&inner, 20);
    tracer.close(&outer, 25);

    let records = handle.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].path, "model > field `name`");
    assert_eq!(records[0].len(), 8);
    assert_eq!(records[1].path, "model");
    assert_eq!(records[1].len(), 15);
    assert_eq!(handle.largest(1)[0].path, "model");
  }

  #[test]
  #[tracing_test::traced_test]
  fn logging_tracer_reports_offsets() {
    let mut tracer = LoggingTracer::new("root build state");
    let trace = path(&[TraceFrame::Build(":".to_string())]);
    tracer.open(&trace, 4);
    tracer.close(&trace, 64);
    assert!(logs_contain("build `:` done"));
    assert!(logs_contain("bytes=60"));
  }
}
