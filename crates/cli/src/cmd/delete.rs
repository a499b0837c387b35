use std::time::{Duration, SystemTime};

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use cfgcache_lib::entry::EntryKey;

use super::open_store;
use crate::output::{OutputFormat, Status, emit_json, short_key};
use crate::prompts::confirm;

pub struct DeleteArgs {
  pub keys: Vec<String>,
  pub all: bool,
  pub older_than: Option<Duration>,
  pub dry_run: bool,
  pub force: bool,
  pub output: OutputFormat,
}

#[derive(Debug, Default, Serialize)]
struct DeleteResult {
  deleted: Vec<String>,
  not_found: Vec<String>,
  failed: Vec<DeleteFailure>,
  dry_run: bool,
}

#[derive(Debug, Serialize)]
struct DeleteFailure {
  key: String,
  error: String,
}

pub fn cmd_delete(args: DeleteArgs) -> Result<()> {
  let (_, store) = open_store()?;

  let mut result = DeleteResult {
    dry_run: args.dry_run,
    ..DeleteResult::default()
  };

  let mut candidates = Vec::new();
  for raw in &args.keys {
    match EntryKey::parse(raw) {
      Some(key) => candidates.push(key),
      None => result.failed.push(DeleteFailure {
        key: raw.clone(),
        error: "invalid entry key".to_string(),
      }),
    }
  }

  if args.all || args.older_than.is_some() {
    let cutoff = args.older_than.and_then(|age| SystemTime::now().checked_sub(age));
    for entry in store.list()? {
      let stale = match cutoff {
        Some(cutoff) => entry.modified_time().is_none_or(|modified| modified < cutoff),
        None => args.all,
      };
      if !stale {
        continue;
      }
      if let Some(key) = EntryKey::parse(&entry.key)
        && !candidates.contains(&key)
      {
        candidates.push(key);
      }
    }
  }

  if candidates.is_empty() {
    return finish(result, args.output, || Status::Note.emit("No cache entries to delete"));
  }

  if !args.output.is_json() {
    if args.dry_run {
      Status::Note.emit("Dry run - the following entries would be deleted:");
    } else {
      println!("The following entries will be deleted:");
    }
    for key in &candidates {
      println!("  {}", key);
    }
  }

  let bulk = args.all || args.older_than.is_some();
  if !args.dry_run && bulk && !confirm(&format!("Delete {} entry(ies)?", candidates.len()), args.force)? {
    return finish(result, args.output, || Status::Note.emit("Cancelled"));
  }

  if args.dry_run {
    result.deleted = candidates.iter().map(EntryKey::to_string).collect();
    return finish(result, args.output, || Status::Note.emit("Dry run - no changes made"));
  }

  for key in candidates {
    debug!(key = %key, "deleting cache entry");
    match store.delete(&key) {
      Ok(true) => result.deleted.push(key.to_string()),
      Ok(false) => result.not_found.push(key.to_string()),
      Err(e) => {
        debug!(key = %key, error = %e, "failed to delete cache entry");
        result.failed.push(DeleteFailure {
          key: key.to_string(),
          error: e.to_string(),
        });
      }
    }
  }

  finish(result, args.output, || {})
}

/// Print the outcome and fail the command if any key could not be deleted.
fn finish(result: DeleteResult, output: OutputFormat, text_summary: impl FnOnce()) -> Result<()> {
  if output.is_json() {
    emit_json(&result)?;
  } else {
    text_summary();
    if !result.deleted.is_empty() && !result.dry_run {
      Status::Done.emit(&format!("Deleted {} entry(ies)", result.deleted.len()));
    }
    for key in &result.not_found {
      Status::Skipped.emit(&format!("No cache entry {}", short_key(key)));
    }
    for failure in &result.failed {
      Status::Failed.emit(&format!("Failed to delete {}: {}", failure.key, failure.error));
    }
  }

  if !result.failed.is_empty() {
    anyhow::bail!("{} entry(ies) could not be deleted", result.failed.len());
  }
  Ok(())
}
