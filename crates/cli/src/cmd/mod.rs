mod delete;
mod list;
mod show;

pub use delete::{DeleteArgs, cmd_delete};
pub use list::cmd_list;
pub use show::cmd_show;

use anyhow::{Context, Result};
use cfgcache_lib::config::CacheConfig;
use cfgcache_lib::entry::EntryStore;

/// The entry store selected by the environment.
fn open_store() -> Result<(CacheConfig, EntryStore)> {
  let config = CacheConfig::from_env().context("Failed to resolve cache directory")?;
  let store = EntryStore::from_config(&config);
  Ok((config, store))
}
