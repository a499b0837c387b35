use anyhow::Result;
use serde::Serialize;

use cfgcache_lib::entry::EntryInfo;

use super::open_store;
use crate::output::{OutputFormat, Status, emit_json, format_age, format_bytes, short_key};

#[derive(Serialize)]
struct ListOutput<'a> {
  cache_dir: String,
  entries: &'a [EntryInfo],
}

pub fn cmd_list(verbose: bool, output: OutputFormat) -> Result<()> {
  let (config, store) = open_store()?;
  let entries = store.list()?;
  let cache_dir = dunce::canonicalize(config.cache_dir()).unwrap_or_else(|_| config.cache_dir().to_path_buf());

  if output.is_json() {
    return emit_json(&ListOutput {
      cache_dir: cache_dir.display().to_string(),
      entries: &entries,
    });
  }

  if entries.is_empty() {
    Status::Note.emit(&format!("No cache entries in {}", cache_dir.display()));
    return Ok(());
  }

  for entry in &entries {
    let key = if verbose { entry.key.as_str() } else { short_key(&entry.key) };
    println!(
      "{}  {} segment(s)  {}  {}",
      key,
      entry.segments.len(),
      format_bytes(entry.total_size()),
      format_age(entry.modified_time())
    );
  }

  Status::Note.emit(&format!("{} entry(ies) in {}", entries.len(), cache_dir.display()));

  Ok(())
}
