use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::stream::Decoder;

use super::key::EntryKey;
use super::segment::{SegmentHeader, StateFile, StateType};

/// The segment files of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
  key: EntryKey,
  dir: PathBuf,
}

impl CacheEntry {
  pub fn key(&self) -> &EntryKey {
    &self.key
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn exists(&self) -> bool {
    self.dir.is_dir()
  }

  pub fn state_file(&self, state_type: StateType) -> StateFile {
    StateFile::new(&self.dir, state_type)
  }

  pub fn entry_details(&self) -> StateFile {
    self.state_file(StateType::EntryDetails)
  }

  pub fn root_build_state(&self) -> StateFile {
    self.state_file(StateType::RootBuild)
  }

  pub fn included_build_state(&self, build_name: &str) -> StateFile {
    self.state_file(StateType::IncludedBuild(build_name.to_string()))
  }

  pub fn model(&self) -> StateFile {
    self.state_file(StateType::Model)
  }

  /// Segment files currently present, sorted by file name.
  pub fn segments(&self) -> Result<Vec<StateFile>, CacheError> {
    let read_dir = match fs::read_dir(&self.dir) {
      Ok(read_dir) => read_dir,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => return Err(list_error(&self.dir, source)),
    };

    let mut segments = Vec::new();
    for dir_entry in read_dir {
      let dir_entry = dir_entry.map_err(|source| list_error(&self.dir, source))?;
      let file_name = dir_entry.file_name();
      if let Some(state_type) = file_name.to_str().and_then(StateType::from_file_name) {
        segments.push(self.state_file(state_type));
      }
    }
    segments.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(segments)
  }
}

/// Listing metadata for one segment.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentInfo {
  pub file_name: String,
  pub kind: String,
  pub size: u64,
  pub format_version: Option<u64>,
  pub fingerprint: Option<String>,
}

/// Listing metadata for one entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
  pub key: String,
  pub path: PathBuf,
  /// Last modification, seconds since the Unix epoch.
  pub modified: Option<u64>,
  pub segments: Vec<SegmentInfo>,
}

impl EntryInfo {
  pub fn total_size(&self) -> u64 {
    self.segments.iter().map(|segment| segment.size).sum()
  }

  pub fn modified_time(&self) -> Option<SystemTime> {
    self
      .modified
      .map(|secs| UNIX_EPOCH + std::time::Duration::from_secs(secs))
  }
}

/// Manages entry directories under the cache root.
#[derive(Debug, Clone)]
pub struct EntryStore {
  /// Base path holding one directory per entry (e.g. `~/.cache/cfgcache/entries`).
  base_path: PathBuf,
}

impl EntryStore {
  pub fn new(base_path: PathBuf) -> Self {
    Self { base_path }
  }

  pub fn from_config(config: &CacheConfig) -> Self {
    Self::new(config.entries_dir())
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  pub fn entry(&self, key: &EntryKey) -> CacheEntry {
    CacheEntry {
      key: key.clone(),
      dir: self.base_path.join(key.as_str()),
    }
  }

  /// All entries, most recently modified first.
  pub fn list(&self) -> Result<Vec<EntryInfo>, CacheError> {
    let read_dir = match fs::read_dir(&self.base_path) {
      Ok(read_dir) => read_dir,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => return Err(list_error(&self.base_path, source)),
    };

    let mut entries = Vec::new();
    for dir_entry in read_dir {
      let dir_entry = dir_entry.map_err(|source| list_error(&self.base_path, source))?;
      let Some(key) = dir_entry.file_name().to_str().and_then(EntryKey::parse) else {
        debug!(path = %dir_entry.path().display(), "skipping non-entry directory");
        continue;
      };
      entries.push(self.inspect(&key)?);
    }
    entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.key.cmp(&b.key)));
    Ok(entries)
  }

  /// Metadata for one entry. A missing entry has no segments.
  pub fn inspect(&self, key: &EntryKey) -> Result<EntryInfo, CacheError> {
    let entry = self.entry(key);
    let modified = fs::metadata(entry.dir())
      .and_then(|metadata| metadata.modified())
      .ok()
      .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
      .map(|age| age.as_secs());

    let mut segments = Vec::new();
    for file in entry.segments()? {
      segments.push(segment_info(&file));
    }

    Ok(EntryInfo {
      key: key.to_string(),
      path: entry.dir().to_path_buf(),
      modified,
      segments,
    })
  }

  /// Remove an entry. Removing a missing entry succeeds.
  pub fn delete(&self, key: &EntryKey) -> Result<bool, CacheError> {
    let dir = self.entry(key).dir;
    match fs::remove_dir_all(&dir) {
      Ok(()) => {
        info!(key = %key, "deleted cache entry");
        Ok(true)
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(source) => Err(CacheError::StateFile {
        action: "delete",
        path: dir,
        source,
      }),
    }
  }

  /// Remove every entry, returning how many were removed.
  pub fn clear(&self) -> Result<usize, CacheError> {
    let mut removed = 0;
    for entry in self.list()? {
      let Some(key) = EntryKey::parse(&entry.key) else {
        continue;
      };
      if self.delete(&key)? {
        removed += 1;
      }
    }
    Ok(removed)
  }
}

fn segment_info(file: &StateFile) -> SegmentInfo {
  let size = fs::metadata(file.path()).map(|metadata| metadata.len()).unwrap_or(0);
  let header = file
    .open()
    .ok()
    .and_then(|reader| SegmentHeader::read_from(&mut Decoder::new(reader)).ok().flatten());

  SegmentInfo {
    file_name: file
      .path()
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default(),
    kind: file.state_type().label(),
    size,
    format_version: header.as_ref().map(|h| h.format_version),
    fingerprint: header.map(|h| h.fingerprint),
  }
}

fn list_error(path: &Path, source: io::Error) -> CacheError {
  CacheError::StateFile {
    action: "list",
    path: path.to_path_buf(),
    source,
  }
}
