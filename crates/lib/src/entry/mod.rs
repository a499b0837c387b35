//! Cache entries on disk.
//!
//! # Storage Layout
//!
//! ```text
//! {cache_dir}/entries/
//! └── <entry-key>/
//!     ├── entry-details.bin
//!     ├── root-build-state.bin
//!     ├── included-build-state-<name>.bin
//!     └── model.bin
//! ```
//!
//! Every segment starts with a [`SegmentHeader`] and is written through a
//! temp file in the entry directory, renamed into place once complete.
//!
//! # Submodules
//!
//! - [`key`] - Entry keys derived from build identity inputs
//! - [`segment`] - Segment header and state file handles
//! - [`store`] - Listing, inspecting and deleting entries

pub mod key;
pub mod segment;
pub mod store;

pub use key::{EntryKey, EntryKeyInputs};
pub use segment::{PendingStateFile, SegmentHeader, StateFile, StateType};
pub use store::{CacheEntry, EntryInfo, EntryStore, SegmentInfo};
