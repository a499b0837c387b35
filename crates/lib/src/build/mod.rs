//! The host's build model, as far as the cache sees it.
//!
//! A build tree consists of one root build and any number of included builds.
//! Each build carries its definition, its configured projects and the work
//! scheduled for it. The cache persists all of this and hands it back through
//! two sinks on read:
//!
//! - [`WorkGraph`] receives restored projects and scheduled work
//! - [`BuildFactory`] materializes included builds the running process does
//!   not have yet
//!
//! # Submodules
//!
//! - [`graph`] - The sinks and in-memory implementations of them
//! - [`types`] - Definitions, projects, work and the tree

mod graph;
mod types;

pub use graph::*;
pub use types::*;
