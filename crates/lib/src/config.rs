//! Cache configuration resolved from the environment.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::consts::{CACHE_DIR_ENV, ENTRIES_DIR, TRACE_ENV};
use crate::platform::paths;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("cannot determine a cache directory: set {CACHE_DIR_ENV} or HOME")]
  NoCacheDir,
}

/// Where entries live and how writes are traced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
  pub cache_dir: PathBuf,
  /// Force offset tracing on every write, regardless of log level.
  pub trace: bool,
}

impl CacheConfig {
  pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
    Self {
      cache_dir: cache_dir.into(),
      trace: false,
    }
  }

  pub fn with_trace(mut self, trace: bool) -> Self {
    self.trace = trace;
    self
  }

  /// Resolve from `CFGCACHE_DIR` and `CFGCACHE_TRACE`, falling back to the
  /// platform cache directory.
  pub fn from_env() -> Result<Self, ConfigError> {
    let cache_dir = match std::env::var_os(CACHE_DIR_ENV) {
      Some(dir) if !dir.is_empty() => PathBuf::from(dir),
      _ => paths::cache_dir().ok_or(ConfigError::NoCacheDir)?,
    };
    let trace = std::env::var(TRACE_ENV)
      .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
      .unwrap_or(false);
    Ok(Self { cache_dir, trace })
  }

  pub fn entries_dir(&self) -> PathBuf {
    self.cache_dir.join(ENTRIES_DIR)
  }

  pub fn cache_dir(&self) -> &Path {
    &self.cache_dir
  }
}
