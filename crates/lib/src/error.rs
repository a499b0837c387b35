//! Fatal error types.
//!
//! Recoverable failures are [problems](crate::problems) and never show up
//! here. Everything in this module aborts the current read or write.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::stream::StreamError;

/// A broken integration or format invariant, as opposed to bad user data.
#[derive(Debug, Error)]
pub enum ContractViolation {
  /// A user bean was written or read with no isolate entered.
  #[error("user type `{type_name}` used outside of any isolate")]
  NoActiveIsolate { type_name: String },

  /// State is read under a different isolate than it was written under.
  #[error("isolate mismatch: reading under `{expected}` but state was written under `{found}`")]
  IsolateMismatch { expected: String, found: String },

  #[error("isolate `{isolate}` is not registered with the host")]
  UnknownIsolate { isolate: String },

  #[error("unknown value tag {tag:#04x} at byte {position}")]
  UnknownTag { tag: u8, position: u64 },

  #[error("reference to bean #{id} which was never written")]
  DanglingReference { id: u64 },

  #[error("reference to type #{index} which was never written")]
  UnknownTypeReference { index: u64 },

  #[error("state belongs to build `{found}`, expected build `{expected}`")]
  BuildMismatch { expected: String, found: String },

  #[error("model read back as null")]
  NullModel,
}

/// Errors returned by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error(transparent)]
  Stream(#[from] StreamError),

  #[error("internal error: {0}")]
  Contract(#[from] ContractViolation),

  /// The segment was written by an incompatible format or registry.
  #[error("{}: incompatible cache format: {reason}", .path.display())]
  IncompatibleFormat { path: PathBuf, reason: String },

  #[error("failed to {action} {}: {source}", .path.display())]
  StateFile {
    action: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("required service `{0}` is not provided by the host")]
  MissingService(&'static str),

  #[error("invalid codec registry: {0}")]
  Registry(String),

  #[error("failed to create build `{build}`: {reason}")]
  BuildCreation { build: String, reason: String },

  #[error("file location {} cannot be stored on this platform", .0.display())]
  UnsupportedPath(PathBuf),

  /// A failure while processing the given segment file.
  #[error("failed to process segment {}", .path.display())]
  Segment {
    path: PathBuf,
    #[source]
    source: Box<CacheError>,
  },
}

impl CacheError {
  /// Attach the segment path, unless the error already names a file.
  pub fn in_segment(self, path: &Path) -> CacheError {
    match self {
      CacheError::IncompatibleFormat { .. } | CacheError::StateFile { .. } | CacheError::Segment { .. } => self,
      other => CacheError::Segment {
        path: path.to_path_buf(),
        source: Box::new(other),
      },
    }
  }

  /// The contract violation behind this error, if that is what it is.
  pub fn contract_violation(&self) -> Option<&ContractViolation> {
    match self {
      CacheError::Contract(violation) => Some(violation),
      CacheError::Segment { source, .. } => source.contract_violation(),
      _ => None,
    }
  }

  /// Innermost error, looking through segment wrappers.
  pub fn root_cause(&self) -> &CacheError {
    match self {
      CacheError::Segment { source, .. } => source.root_cause(),
      other => other,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn segment_wrapper_names_the_file() {
    let error = CacheError::from(ContractViolation::NullModel).in_segment(Path::new("/cache/abc/model.bin"));
    assert_eq!(error.to_string(), "failed to process segment /cache/abc/model.bin");
    let source = std::error::Error::source(&error).map(ToString::to_string);
    assert_eq!(source.as_deref(), Some("internal error: model read back as null"));
    assert!(matches!(error.contract_violation(), Some(ContractViolation::NullModel)));
  }

  #[test]
  fn errors_naming_a_file_are_not_wrapped_twice() {
    let error = CacheError::IncompatibleFormat {
      path: PathBuf::from("/cache/abc/model.bin"),
      reason: "bad magic".to_string(),
    };
    let wrapped = error.in_segment(Path::new("/cache/abc/model.bin"));
    assert!(matches!(wrapped, CacheError::IncompatibleFormat { .. }));
  }
}
