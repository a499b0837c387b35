use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::consts::{FORMAT_VERSION, SEGMENT_EXT, SEGMENT_MAGIC};
use crate::error::CacheError;
use crate::stream::{Decoder, Encoder, StreamError};

/// The kind of state a segment holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateType {
  EntryDetails,
  RootBuild,
  IncludedBuild(String),
  Model,
}

impl StateType {
  pub fn tag(&self) -> u8 {
    match self {
      StateType::EntryDetails => 1,
      StateType::RootBuild => 2,
      StateType::IncludedBuild(_) => 3,
      StateType::Model => 4,
    }
  }

  /// Short label for listings.
  pub fn label(&self) -> String {
    match self {
      StateType::EntryDetails => "entry details".to_string(),
      StateType::RootBuild => "root build state".to_string(),
      StateType::IncludedBuild(name) => format!("included build state '{name}'"),
      StateType::Model => "model".to_string(),
    }
  }

  pub fn file_name(&self) -> String {
    match self {
      StateType::EntryDetails => format!("entry-details.{SEGMENT_EXT}"),
      StateType::RootBuild => format!("root-build-state.{SEGMENT_EXT}"),
      StateType::IncludedBuild(name) => {
        format!("included-build-state-{}.{SEGMENT_EXT}", escape_build_name(name))
      }
      StateType::Model => format!("model.{SEGMENT_EXT}"),
    }
  }

  /// Inverse of [`file_name`](Self::file_name).
  pub fn from_file_name(file_name: &str) -> Option<Self> {
    let stem = file_name.strip_suffix(SEGMENT_EXT)?.strip_suffix('.')?;
    match stem {
      "entry-details" => Some(StateType::EntryDetails),
      "root-build-state" => Some(StateType::RootBuild),
      "model" => Some(StateType::Model),
      _ => stem
        .strip_prefix("included-build-state-")
        .filter(|name| !name.is_empty())
        .and_then(unescape_build_name)
        .map(StateType::IncludedBuild),
    }
  }
}

/// Build names become part of a file name, so every byte outside a safe set
/// is written as `%XX`. Separators and `%` itself are always escaped.
fn escape_build_name(name: &str) -> String {
  let mut escaped = String::with_capacity(name.len());
  for byte in name.bytes() {
    if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'@' | b'+') {
      escaped.push(char::from(byte));
    } else {
      escaped.push_str(&format!("%{byte:02X}"));
    }
  }
  escaped
}

fn unescape_build_name(escaped: &str) -> Option<String> {
  let bytes = escaped.as_bytes();
  let mut name = Vec::with_capacity(bytes.len());
  let mut i = 0;
  while i < bytes.len() {
    if bytes[i] == b'%' {
      let hex = escaped.get(i + 1..i + 3)?;
      name.push(u8::from_str_radix(hex, 16).ok()?);
      i += 3;
    } else {
      name.push(bytes[i]);
      i += 1;
    }
  }
  String::from_utf8(name).ok()
}

/// Leading record of every segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
  pub format_version: u64,
  pub state_tag: u8,
  pub fingerprint: String,
}

impl SegmentHeader {
  pub fn new(state_type: &StateType, fingerprint: &str) -> Self {
    Self {
      format_version: FORMAT_VERSION,
      state_tag: state_type.tag(),
      fingerprint: fingerprint.to_string(),
    }
  }

  pub fn write_to<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<(), StreamError> {
    encoder.write_raw(SEGMENT_MAGIC)?;
    encoder.write_var_u64(self.format_version)?;
    encoder.write_u8(self.state_tag)?;
    encoder.write_str(&self.fingerprint)
  }

  /// Read a header. `Ok(None)` means the data is not a segment at all.
  pub fn read_from<R: Read>(decoder: &mut Decoder<R>) -> Result<Option<Self>, StreamError> {
    let mut magic = [0u8; 4];
    decoder.read_raw(&mut magic)?;
    if &magic != SEGMENT_MAGIC {
      return Ok(None);
    }
    Ok(Some(Self {
      format_version: decoder.read_var_u64()?,
      state_tag: decoder.read_u8()?,
      fingerprint: decoder.read_str()?,
    }))
  }

  /// Why a segment with this header cannot be read as `expected`, if it cannot.
  pub fn incompatibility(&self, expected: &SegmentHeader) -> Option<String> {
    if self.format_version != expected.format_version {
      return Some(format!(
        "format version {} (expected {})",
        self.format_version, expected.format_version
      ));
    }
    if self.state_tag != expected.state_tag {
      return Some(format!(
        "segment type {} (expected {})",
        self.state_tag, expected.state_tag
      ));
    }
    if self.fingerprint != expected.fingerprint {
      return Some(format!(
        "codec registry fingerprint {} (expected {})",
        self.fingerprint, expected.fingerprint
      ));
    }
    None
  }
}

/// One segment file of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateFile {
  path: PathBuf,
  state_type: StateType,
}

impl StateFile {
  pub fn new(dir: &Path, state_type: StateType) -> Self {
    Self {
      path: dir.join(state_type.file_name()),
      state_type,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn state_type(&self) -> &StateType {
    &self.state_type
  }

  /// Whether the segment exists and can be opened.
  pub fn can_read(&self) -> bool {
    self.path.is_file() && File::open(&self.path).is_ok()
  }

  pub fn open(&self) -> Result<BufReader<File>, CacheError> {
    let file = File::open(&self.path).map_err(|source| CacheError::StateFile {
      action: "open",
      path: self.path.clone(),
      source,
    })?;
    Ok(BufReader::new(file))
  }

  /// Start writing the segment. Nothing is visible at [`path`](Self::path)
  /// until [`PendingStateFile::commit`] succeeds.
  pub fn create(&self) -> Result<PendingStateFile, CacheError> {
    let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
    let io_error = |action, source| CacheError::StateFile {
      action,
      path: self.path.clone(),
      source,
    };
    fs::create_dir_all(dir).map_err(|e| io_error("create directory for", e))?;
    let temp = NamedTempFile::new_in(dir).map_err(|e| io_error("create temp file for", e))?;
    Ok(PendingStateFile {
      temp,
      target: self.path.clone(),
    })
  }
}

/// A segment being written. Dropping it without committing removes the
/// temp file.
#[derive(Debug)]
pub struct PendingStateFile {
  temp: NamedTempFile,
  target: PathBuf,
}

impl PendingStateFile {
  pub fn writer(&mut self) -> &mut File {
    self.temp.as_file_mut()
  }

  pub fn temp_path(&self) -> &Path {
    self.temp.path()
  }

  /// Atomically move the written segment into place.
  pub fn commit(self) -> Result<(), CacheError> {
    let target = self.target;
    self
      .temp
      .as_file()
      .sync_all()
      .map_err(|source| CacheError::StateFile {
        action: "sync",
        path: target.clone(),
        source,
      })?;
    self.temp.persist(&target).map_err(|e| CacheError::StateFile {
      action: "commit",
      path: target.clone(),
      source: e.error,
    })?;
    Ok(())
  }
}

impl Write for PendingStateFile {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.temp.write(buf)
  }

  fn flush(&mut self) -> io::Result<()> {
    self.temp.flush()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn file_names_round_trip() {
    for state_type in [
      StateType::EntryDetails,
      StateType::RootBuild,
      StateType::IncludedBuild("lib".to_string()),
      StateType::Model,
    ] {
      assert_eq!(StateType::from_file_name(&state_type.file_name()), Some(state_type));
    }
    assert_eq!(StateType::from_file_name("included-build-state-.bin"), None);
    assert_eq!(StateType::from_file_name("included-build-state-%zz.bin"), None);
    assert_eq!(StateType::from_file_name("notes.txt"), None);
  }

  #[test]
  fn included_build_names_cannot_leave_the_entry_directory() {
    for name in ["../evil", "a/b", "..", "c:\\d", "50%.v2"] {
      let state_type = StateType::IncludedBuild(name.to_string());
      let file_name = state_type.file_name();
      assert!(!file_name.contains('/'), "{file_name}");
      assert!(!file_name.contains('\\'), "{file_name}");
      assert!(!file_name.contains(".."), "{file_name}");
      assert_eq!(Path::new(&file_name).components().count(), 1);
      assert_eq!(StateType::from_file_name(&file_name), Some(state_type));
    }
  }

  #[test]
  fn header_mismatch_is_explained() {
    let expected = SegmentHeader::new(&StateType::Model, "aaaa");
    let other = SegmentHeader::new(&StateType::Model, "bbbb");
    let reason = other.incompatibility(&expected).unwrap();
    assert!(reason.contains("fingerprint bbbb"));
    assert!(expected.incompatibility(&expected.clone()).is_none());
  }

  #[test]
  fn header_survives_the_stream() {
    let header = SegmentHeader::new(&StateType::RootBuild, "0123456789abcdef");
    let mut encoder = Encoder::new(Vec::new());
    header.write_to(&mut encoder).unwrap();
    let bytes = encoder.into_inner();
    assert_eq!(&bytes[..4], SEGMENT_MAGIC);

    let mut decoder = Decoder::new(&bytes[..]);
    assert_eq!(SegmentHeader::read_from(&mut decoder).unwrap(), Some(header));
  }

  #[test]
  fn non_segment_data_has_no_header() {
    let mut decoder = Decoder::new(&b"PK\x03\x04rest"[..]);
    assert_eq!(SegmentHeader::read_from(&mut decoder).unwrap(), None);
  }

  #[test]
  fn uncommitted_writes_leave_nothing_behind() {
    let temp = TempDir::new().unwrap();
    let file = StateFile::new(temp.path(), StateType::Model);

    let mut pending = file.create().unwrap();
    pending.write_all(b"partial").unwrap();
    let temp_path = pending.temp_path().to_path_buf();
    drop(pending);

    assert!(!file.can_read());
    assert!(!temp_path.exists());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
  }

  #[test]
  fn commit_moves_segment_into_place() {
    let temp = TempDir::new().unwrap();
    let file = StateFile::new(&temp.path().join("entry"), StateType::Model);

    let mut pending = file.create().unwrap();
    pending.write_all(b"complete").unwrap();
    pending.commit().unwrap();

    assert!(file.can_read());
    assert_eq!(fs::read(file.path()).unwrap(), b"complete");
  }
}
