//! Leading tag bytes of encoded values.

/// Sentinel for a value that could not be written.
pub const UNAVAILABLE: u8 = 0x01;

pub const LIST: u8 = 0x10;
pub const MAP: u8 = 0x11;

pub const SERVICE: u8 = 0x20;

pub const FILE: u8 = 0x30;

/// First occurrence of a bean in a segment.
pub const BEAN: u8 = 0x40;
/// Back reference to a bean already written in the segment.
pub const BEAN_REF: u8 = 0x41;

pub const NULL: u8 = 0x50;
pub const TRUE: u8 = 0x51;
pub const FALSE: u8 = 0x52;
pub const INT: u8 = 0x53;
pub const FLOAT: u8 = 0x54;
pub const STRING: u8 = 0x55;
pub const BYTES: u8 = 0x56;
