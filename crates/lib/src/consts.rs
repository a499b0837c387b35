pub const APP_NAME: &str = "cfgcache";

/// Version of the segment layout. Bumped whenever the stream format changes.
pub const FORMAT_VERSION: u64 = 1;

/// Leading bytes of every segment file.
pub const SEGMENT_MAGIC: &[u8; 4] = b"CCST";

/// Length of the hex registry fingerprint stored in segment headers.
pub const FINGERPRINT_LEN: usize = 16;

/// Length of the hex entry key naming an entry directory.
pub const ENTRY_KEY_LEN: usize = 32;

/// Directory under the cache root holding one directory per entry.
pub const ENTRIES_DIR: &str = "entries";

/// Extension shared by all segment files.
pub const SEGMENT_EXT: &str = "bin";

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "CFGCACHE_DIR";

/// Environment variable forcing offset tracing on writes.
pub const TRACE_ENV: &str = "CFGCACHE_TRACE";
