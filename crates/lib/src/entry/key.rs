use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::ENTRY_KEY_LEN;
use crate::util::hash::{HashError, Hashable};

/// The build identity an entry is addressed by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryKeyInputs {
  pub root_dir: PathBuf,
  pub requested_tasks: Vec<String>,
  /// Any further identity strings the host considers relevant.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub extra: BTreeMap<String, String>,
}

impl EntryKeyInputs {
  pub fn new(root_dir: impl Into<PathBuf>) -> Self {
    Self {
      root_dir: root_dir.into(),
      ..Self::default()
    }
  }

  pub fn with_task(mut self, task: impl Into<String>) -> Self {
    self.requested_tasks.push(task.into());
    self
  }

  pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.extra.insert(name.into(), value.into());
    self
  }
}

impl Hashable for EntryKeyInputs {}

/// Name of an entry directory: a truncated hex SHA-256 of its inputs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryKey(String);

impl EntryKey {
  pub fn for_inputs(inputs: &EntryKeyInputs) -> Result<Self, HashError> {
    Ok(Self(inputs.compute_hash()?.0))
  }

  /// Accept `key` only if it has the shape of an entry key.
  pub fn parse(key: &str) -> Option<Self> {
    let valid = key.len() == ENTRY_KEY_LEN && key.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    valid.then(|| Self(key.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for EntryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}
