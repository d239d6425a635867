//! Views of the metadata index

use crate::db;
use crate::error::Result;
use crate::types::CacheEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Index operations needed to reclaim stale cache entries.
///
/// Both operations filter on the same predicate, `last_read_at < threshold`.
/// `delete_expired` re-evaluates it at delete time rather than removing a
/// previously read set of rows.
#[async_trait]
pub trait CacheIndex: Send + Sync {
    /// Relative file paths of entries last read before `threshold`
    async fn expired_paths(&self, threshold: DateTime<Utc>) -> Result<Vec<String>>;

    /// Remove entries last read before `threshold`, returning how many were removed
    async fn delete_expired(&self, threshold: DateTime<Utc>) -> Result<u64>;
}

/// Per-URL index operations used on the read path
#[async_trait]
pub trait EntryIndex: Send + Sync {
    async fn find(&self, url: &str) -> Result<Option<CacheEntry>>;

    /// Insert or replace the row for a freshly fetched file
    async fn record(&self, url: &str, file_path: &str, content_type: &str, size: i64)
        -> Result<()>;

    /// Mark an entry as read now
    async fn touch(&self, url: &str) -> Result<()>;
}

/// PostgreSQL-backed cache index
#[derive(Clone)]
pub struct PgCacheIndex {
    pool: PgPool,
}

impl PgCacheIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheIndex for PgCacheIndex {
    async fn expired_paths(&self, threshold: DateTime<Utc>) -> Result<Vec<String>> {
        Ok(db::expired_paths(&self.pool, threshold).await?)
    }

    async fn delete_expired(&self, threshold: DateTime<Utc>) -> Result<u64> {
        Ok(db::delete_expired(&self.pool, threshold).await?)
    }
}

#[async_trait]
impl EntryIndex for PgCacheIndex {
    async fn find(&self, url: &str) -> Result<Option<CacheEntry>> {
        Ok(db::find_by_url(&self.pool, url).await?)
    }

    async fn record(
        &self,
        url: &str,
        file_path: &str,
        content_type: &str,
        size: i64,
    ) -> Result<()> {
        Ok(db::upsert(&self.pool, url, file_path, content_type, size).await?)
    }

    async fn touch(&self, url: &str) -> Result<()> {
        Ok(db::touch(&self.pool, url).await?)
    }
}
