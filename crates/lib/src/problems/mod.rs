//! Non-fatal serialization problems.
//!
//! A value that cannot be written is replaced by an "unavailable" sentinel and
//! recorded here; the rest of the graph is still written. Reading a sentinel
//! yields [`Value::Missing`](crate::codec::Value::Missing) and records a
//! problem again so the loss stays visible.
//!
//! Problems are collected per operation by a [`ProblemCollector`] and handed to
//! the host's [`ProblemsListener`] when the operation ends, whether it
//! succeeded or not.
//!
//! # Submodules
//!
//! - [`report`] - Host-side aggregation and invalidation policy
//! - `types` - Problem, kind and property trace types

pub mod report;
mod types;

pub use report::{
  AnyProblem, InvalidationPolicy, NeverInvalidate, ProblemReport, ProblemSummary, ProblemThreshold, ReportedProblem,
};
pub use types::*;

/// Receives the problems of one finished operation.
pub trait ProblemsListener: Send + Sync {
  /// `profile` names the segment the problems belong to.
  fn on_problems(&self, profile: &str, problems: Vec<Problem>);
}

/// Accumulates the problems of a single read or write.
#[derive(Debug, Default)]
pub struct ProblemCollector {
  problems: Vec<Problem>,
}

impl ProblemCollector {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record(&mut self, problem: Problem) {
    self.problems.push(problem);
  }

  pub fn len(&self) -> usize {
    self.problems.len()
  }

  pub fn is_empty(&self) -> bool {
    self.problems.is_empty()
  }

  pub fn problems(&self) -> &[Problem] {
    &self.problems
  }

  /// Take the collected problems, leaving the collector empty.
  pub fn take(&mut self) -> Vec<Problem> {
    std::mem::take(&mut self.problems)
  }
}
