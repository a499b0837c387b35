//! Read and write sessions over one segment stream.
//!
//! A context composes everything a single read or write needs: the stream,
//! the codec registry, the stack of entered isolates, the problem collector,
//! the current property trace and, on the write side, an optional
//! [tracer](crate::trace). Isolates and trace frames are entered with scoped
//! calls that restore the previous state on every exit, including errors.
//!
//! Bean identity and interned type references are tracked per context, which
//! is what keeps segments self-contained.

mod read;
mod write;

pub use read::ReadContext;
pub use write::WriteContext;
