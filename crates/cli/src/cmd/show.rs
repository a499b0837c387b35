use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use serde::Serialize;

use cfgcache_lib::CacheIo;
use cfgcache_lib::build::BuildDefinition;
use cfgcache_lib::config::CacheConfig;
use cfgcache_lib::entry::{CacheEntry, EntryInfo, EntryKey};
use cfgcache_lib::host::{ServiceRegistry, StaticHost};
use cfgcache_lib::isolate::IsolateRegistry;
use cfgcache_lib::problems::ProblemReport;

use super::open_store;
use crate::output::{OutputFormat, Status, detail, emit_json, format_age, format_bytes};

#[derive(Serialize)]
struct ShowOutput<'a> {
  #[serde(flatten)]
  entry: &'a EntryInfo,
  total_size: u64,
  included_builds: Vec<PathBuf>,
}

pub fn cmd_show(key: &str, verbose: bool, output: OutputFormat) -> Result<()> {
  let Some(key) = EntryKey::parse(key) else {
    bail!("Invalid entry key '{}'", key);
  };

  let (config, store) = open_store()?;
  let entry = store.entry(&key);
  if !entry.exists() {
    bail!("No cache entry {}", key);
  }

  let info = store.inspect(&key)?;
  let included_builds = included_builds(&config, &entry)?;

  if output.is_json() {
    return emit_json(&ShowOutput {
      entry: &info,
      total_size: info.total_size(),
      included_builds,
    });
  }

  Status::Done.emit(&format!("Entry {}", info.key));
  detail("Path", &info.path.display().to_string());
  detail("Modified", &format_age(info.modified_time()));
  detail("Size", &format_bytes(info.total_size()));

  println!();
  println!("Segments:");
  for segment in &info.segments {
    match (&segment.format_version, &segment.fingerprint) {
      (Some(version), Some(fingerprint)) if verbose => println!(
        "  {:<40} {:>10}  v{} {}",
        segment.file_name,
        format_bytes(segment.size),
        version,
        fingerprint
      ),
      (Some(_), _) => println!("  {:<40} {:>10}", segment.file_name, format_bytes(segment.size)),
      (None, _) => {
        println!("  {:<40} {:>10}", segment.file_name, format_bytes(segment.size));
        Status::Skipped.emit(&format!("{} is not a readable segment", segment.file_name));
      }
    }
  }

  if !included_builds.is_empty() {
    println!();
    println!("Included builds:");
    for root_dir in &included_builds {
      println!("  {}", root_dir.display());
    }
  }

  Ok(())
}

/// Root directories recorded in the entry details.
///
/// Entry details only hold file references, so a host with stock
/// collaborators can read them back.
fn included_builds(config: &CacheConfig, entry: &CacheEntry) -> Result<Vec<PathBuf>> {
  let host = StaticHost::new(
    BuildDefinition::root(entry.dir(), "cfgcache"),
    ServiceRegistry::with_defaults(IsolateRegistry::new()),
  );
  let io = CacheIo::new(Arc::new(host), Arc::new(ProblemReport::default()), config)?;
  Ok(io.read_cache_entry_details(&entry.entry_details()))
}
