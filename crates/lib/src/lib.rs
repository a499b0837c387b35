//! cfgcache-lib: build-state snapshot store
//!
//! This crate persists a build's configured state to a cache entry and
//! restores it on a later run:
//! - `CacheIo`: reads and writes the segments of an entry
//! - `Value`: the dynamic object graph that is persisted, beans included
//! - `CodecRegistry`: ordered codec families the graph is encoded with
//! - `Problem`: non-fatal failures recorded instead of aborting a write
//! - `EntryStore`: entry directories on disk

pub mod bean;
pub mod build;
pub mod codec;
pub mod config;
pub mod consts;
pub mod context;
pub mod entry;
pub mod error;
pub mod host;
pub mod io;
pub mod isolate;
pub mod platform;
pub mod problems;
pub mod stream;
pub mod trace;
pub mod util;

pub use error::{CacheError, ContractViolation};
pub use io::CacheIo;
