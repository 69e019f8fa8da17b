// # Cache Store
//
// Durable, timestamped snapshot of the last resolution pass.
//
// The cache decides whether a run needs to query the echo services at all:
// a snapshot younger than the TTL is reused as-is, anything else is replaced.

pub mod file;

pub use file::{DEFAULT_CACHE_FILE_NAME, FileCacheStore};
