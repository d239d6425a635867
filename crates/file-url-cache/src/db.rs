//! SQL for the `file_cache` index table

use crate::types::CacheEntry;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Look up the index row for a URL
pub async fn find_by_url(pool: &PgPool, url: &str) -> Result<Option<CacheEntry>, sqlx::Error> {
    sqlx::query_as::<_, CacheEntry>(
        r#"
        SELECT url, file_path, content_type, size, created_at, last_read_at
        FROM file_cache
        WHERE url = $1
        "#,
    )
    .bind(url)
    .fetch_optional(pool)
    .await
}

/// Insert or replace the index row for a freshly fetched file
pub async fn upsert(
    pool: &PgPool,
    url: &str,
    file_path: &str,
    content_type: &str,
    size: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO file_cache (url, file_path, content_type, size, created_at, last_read_at)
        VALUES ($1, $2, $3, $4, NOW(), NOW())
        ON CONFLICT (url) DO UPDATE SET
            file_path = EXCLUDED.file_path,
            content_type = EXCLUDED.content_type,
            size = EXCLUDED.size,
            last_read_at = NOW()
        "#,
    )
    .bind(url)
    .bind(file_path)
    .bind(content_type)
    .bind(size)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark an entry as read now
pub async fn touch(pool: &PgPool, url: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE file_cache SET last_read_at = NOW() WHERE url = $1")
        .bind(url)
        .execute(pool)
        .await?;
    Ok(())
}

/// Relative paths of every entry last read before `threshold`
pub async fn expired_paths(
    pool: &PgPool,
    threshold: DateTime<Utc>,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT file_path FROM file_cache WHERE last_read_at < $1")
            .bind(threshold)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Delete every entry last read before `threshold`, returning the row count
pub async fn delete_expired(pool: &PgPool, threshold: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM file_cache WHERE last_read_at < $1")
        .bind(threshold)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
