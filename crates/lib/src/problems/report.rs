//! Host-side problem aggregation.
//!
//! Whether accumulated problems should force the next run to reconfigure is
//! host policy, expressed as an [`InvalidationPolicy`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::warn;

use super::{Problem, ProblemsListener};

/// A problem together with the segment it was reported for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedProblem {
  pub profile: String,
  pub problem: Problem,
}

/// Counts of reported problems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProblemSummary {
  pub total: usize,
  pub by_kind: BTreeMap<String, usize>,
}

/// Decides whether reported problems make the entry unfit for reuse.
pub trait InvalidationPolicy: Send + Sync {
  fn invalidates(&self, summary: &ProblemSummary) -> bool;
}

/// Any problem at all invalidates the entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnyProblem;

impl InvalidationPolicy for AnyProblem {
  fn invalidates(&self, summary: &ProblemSummary) -> bool {
    summary.total > 0
  }
}

/// Problems never invalidate the entry; they are only reported.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverInvalidate;

impl InvalidationPolicy for NeverInvalidate {
  fn invalidates(&self, _summary: &ProblemSummary) -> bool {
    false
  }
}

/// More than the given number of problems invalidates the entry.
#[derive(Debug, Clone, Copy)]
pub struct ProblemThreshold(pub usize);

impl InvalidationPolicy for ProblemThreshold {
  fn invalidates(&self, summary: &ProblemSummary) -> bool {
    summary.total > self.0
  }
}

/// Collects problems across operations and logs each one as a warning.
pub struct ProblemReport {
  problems: Mutex<Vec<ReportedProblem>>,
  policy: Arc<dyn InvalidationPolicy>,
}

impl ProblemReport {
  pub fn new(policy: Arc<dyn InvalidationPolicy>) -> Self {
    Self {
      problems: Mutex::new(Vec::new()),
      policy,
    }
  }

  /// Batches are appended with a single `extend`, so a poisoned list is still whole.
  fn reported(&self) -> MutexGuard<'_, Vec<ReportedProblem>> {
    self.problems.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// All problems reported so far, in report order.
  pub fn problems(&self) -> Vec<ReportedProblem> {
    self.reported().clone()
  }

  pub fn len(&self) -> usize {
    self.reported().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn summary(&self) -> ProblemSummary {
    let mut summary = ProblemSummary::default();
    for reported in self.problems() {
      summary.total += 1;
      *summary.by_kind.entry(reported.problem.kind.to_string()).or_default() += 1;
    }
    summary
  }

  /// Whether the host should treat the entry as unusable on the next run.
  pub fn should_invalidate(&self) -> bool {
    self.policy.invalidates(&self.summary())
  }
}

impl Default for ProblemReport {
  fn default() -> Self {
    Self::new(Arc::new(AnyProblem))
  }
}

impl ProblemsListener for ProblemReport {
  fn on_problems(&self, profile: &str, problems: Vec<Problem>) {
    if problems.is_empty() {
      return;
    }
    for problem in &problems {
      warn!(profile = %profile, kind = %problem.kind, "{}", problem);
    }
    self.reported().extend(problems.into_iter().map(|problem| ReportedProblem {
      profile: profile.to_string(),
      problem,
    }));
  }
}
