//! Hashing utilities for entry keys and registry fingerprints.
//!
//! This module provides:
//! - `ObjectHash`: A truncated hash naming a cache entry
//! - `ContentHash`: A full 64-character hash
//! - `hash_bytes()`: Arbitrary byte hashing

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::ENTRY_KEY_LEN;

pub type HashError = serde_json::Error;

/// A hash identifying a unique object.
///
/// The hash is a truncated SHA-256 of the JSON-serialized struct, as a
/// lowercase hexadecimal string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(pub String);

impl std::fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, HashError> {
    let serialized = serde_json::to_string(self)?;
    let full = hash_bytes(serialized.as_bytes());
    Ok(ObjectHash(full.0[..ENTRY_KEY_LEN].to_string()))
  }
}

/// A full 64-character SHA256 hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Hash arbitrary bytes.
///
/// Returns the full 64-character SHA256 hash.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Serialize)]
  struct Inputs {
    root: String,
    tasks: Vec<String>,
  }

  impl Hashable for Inputs {}

  #[test]
  fn hash_bytes_is_full_sha256() {
    let hash = hash_bytes(b"hello world");
    assert_eq!(
      hash.0,
      "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );
  }

  #[test]
  fn object_hash_is_truncated_and_deterministic() {
    let inputs = Inputs {
      root: "/work".to_string(),
      tasks: vec!["build".to_string()],
    };
    let first = inputs.compute_hash().unwrap();
    let second = inputs.compute_hash().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.0.len(), ENTRY_KEY_LEN);
  }

  #[test]
  fn object_hash_changes_with_inputs() {
    let a = Inputs {
      root: "/work".to_string(),
      tasks: vec!["build".to_string()],
    };
    let b = Inputs {
      root: "/work".to_string(),
      tasks: vec!["test".to_string()],
    };
    assert_ne!(a.compute_hash().unwrap(), b.compute_hash().unwrap());
  }
}
