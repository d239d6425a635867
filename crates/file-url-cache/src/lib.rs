//! Disk-backed cache of remotely fetched files
//!
//! Maps a URL to a file stored under a cache root. The first access fetches
//! the file from its origin and persists it; the metadata index lives in
//! PostgreSQL and records when each entry was last read so that stale files
//! can be reclaimed.

pub mod db;
mod error;
mod index;
mod origin;
mod store;
mod types;

pub use error::{Result, StoreError};
pub use index::{CacheIndex, EntryIndex, PgCacheIndex};
pub use origin::OriginFetcher;
pub use store::{cache_key, relative_path, CacheStore, FileCache};
pub use types::{CacheEntry, CachedContent};
