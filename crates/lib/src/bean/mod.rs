//! User beans and their reconstruction.
//!
//! A bean is an instance of a user-defined type: a named record of fields
//! whose type lives in an [isolate](crate::isolate). Beans are shared by
//! reference, so one bean may be reachable from several places in a graph,
//! including from itself.
//!
//! Types do not need a trivial constructor. Each bean records *how* it was
//! constructed ([`Construction`]), and each type declares which strategies it
//! accepts ([`TypeDescriptor`]). On read the [`BeanConstructors`] service
//! replays the recorded strategy to obtain a fresh instance before its fields
//! are restored.
//!
//! # Submodules
//!
//! - [`constructors`] - The bean constructor service
//! - `types` - Bean, reference, strategy and descriptor types

pub mod constructors;
mod types;

pub use constructors::{BeanConstructors, ConstructionError, DefaultBeanConstructors, validate};
pub use types::*;
