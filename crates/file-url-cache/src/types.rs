//! Cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Index row for a cached file
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CacheEntry {
    pub url: String,
    /// Path of the file relative to the cache root
    pub file_path: String,
    pub content_type: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub last_read_at: DateTime<Utc>,
}

/// Bytes of a cached file together with its origin content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedContent {
    pub data: Vec<u8>,
    pub content_type: String,
}
