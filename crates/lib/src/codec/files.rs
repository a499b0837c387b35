//! File references.
//!
//! A file is persisted by location only. On read the location is passed
//! through the host's [`FileResolver`], which lets a restored build map
//! recorded paths onto its own layout.

use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::ffi::OsString;
#[cfg(unix)]
use std::os::unix::ffi::{OsStrExt, OsStringExt};

use crate::context::{ReadContext, WriteContext};
use crate::error::CacheError;

use super::{CodecFamily, EncodeError, Value, tags};

/// Maps recorded file locations to the files the reader should see.
pub trait FileResolver: Send + Sync {
  fn resolve(&self, recorded: &Path) -> PathBuf;
}

/// Returns recorded locations unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityFileResolver;

impl FileResolver for IdentityFileResolver {
  fn resolve(&self, recorded: &Path) -> PathBuf {
    recorded.to_path_buf()
  }
}

/// Resolves relative locations against a base directory.
#[derive(Debug, Clone)]
pub struct BaseDirFileResolver {
  base: PathBuf,
}

impl BaseDirFileResolver {
  pub fn new(base: impl Into<PathBuf>) -> Self {
    Self { base: base.into() }
  }
}

impl FileResolver for BaseDirFileResolver {
  fn resolve(&self, recorded: &Path) -> PathBuf {
    if recorded.is_absolute() {
      recorded.to_path_buf()
    } else {
      self.base.join(recorded)
    }
  }
}

/// Bytes a location is stored as, or `None` if this platform cannot store
/// it losslessly.
#[cfg(unix)]
pub(crate) fn location_bytes(path: &Path) -> Option<&[u8]> {
  Some(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
pub(crate) fn location_bytes(path: &Path) -> Option<&[u8]> {
  path.to_str().map(str::as_bytes)
}

#[cfg(unix)]
pub(crate) fn location_from_bytes(bytes: Vec<u8>) -> Option<PathBuf> {
  Some(PathBuf::from(OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
pub(crate) fn location_from_bytes(bytes: Vec<u8>) -> Option<PathBuf> {
  String::from_utf8(bytes).ok().map(PathBuf::from)
}

pub struct FileCodec;

impl CodecFamily for FileCodec {
  fn name(&self) -> &'static str {
    "files"
  }

  fn tags(&self) -> &'static [u8] {
    &[tags::FILE]
  }

  fn claims(&self, value: &Value) -> bool {
    matches!(value, Value::File(_))
  }

  fn encode(&self, ctx: &mut WriteContext<'_>, value: &Value) -> Result<(), EncodeError> {
    let Value::File(path) = value else {
      return Err(EncodeError::Unserializable(format!(
        "`{}` is not a file",
        value.type_name()
      )));
    };
    if location_bytes(path).is_none() {
      return Err(EncodeError::Unserializable(format!(
        "file location {} cannot be stored on this platform",
        path.display()
      )));
    }

    ctx.encoder().write_u8(tags::FILE)?;
    ctx.write_file(path)?;
    Ok(())
  }

  fn decode(&self, ctx: &mut ReadContext<'_>, tag: u8) -> Result<Value, CacheError> {
    if tag != tags::FILE {
      return Err(ctx.unknown_tag(tag));
    }
    Ok(Value::File(ctx.read_file()?))
  }
}
