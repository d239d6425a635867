//! URL-keyed file cache with on-demand origin fetches

use crate::error::Result;
use crate::index::EntryIndex;
use crate::origin::OriginFetcher;
use crate::types::CachedContent;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// Read access to cached files, fetching and persisting them on first access.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Path of the cached file, relative to the cache root
    async fn get_url(&self, url: &str) -> Result<String>;

    /// Bytes and content type of the cached file
    async fn get_content(&self, url: &str) -> Result<CachedContent>;
}

/// Generate a cache key from a URL
pub fn cache_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Relative location of a key under the cache root, fanned out by prefix
pub fn relative_path(key: &str) -> String {
    format!("{}/{}", &key[..2], key)
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `data` to `path` via a sibling temp file so readers never see a partial file
async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("tmp.{}.{}", std::process::id(), seq));
    if let Err(e) = fs::write(&tmp, data).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// File cache backed by a directory on disk and the `file_cache` index table
pub struct FileCache {
    index: Arc<dyn EntryIndex>,
    cache_dir: PathBuf,
    origin: OriginFetcher,
}

impl FileCache {
    /// Open the cache, creating the cache root and resolving it to an absolute path
    pub async fn open(
        index: Arc<dyn EntryIndex>,
        cache_dir: PathBuf,
        origin: OriginFetcher,
    ) -> Result<Self> {
        fs::create_dir_all(&cache_dir).await?;
        let cache_dir = fs::canonicalize(&cache_dir).await?;
        info!(cache_dir = ?cache_dir, "Cache initialized");
        Ok(Self {
            index,
            cache_dir,
            origin,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Fetch `url` from origin, persist it, and return the new relative path
    async fn fill(&self, url: &str) -> Result<(String, CachedContent)> {
        let content = self.origin.fetch(url).await?;
        let file_path = relative_path(&cache_key(url));

        write_atomic(&self.cache_dir.join(&file_path), &content.data).await?;
        self.index
            .record(
                url,
                &file_path,
                &content.content_type,
                content.data.len() as i64,
            )
            .await?;

        debug!(url = %url, file_path = %file_path, size = content.data.len(), "Cached file");
        Ok((file_path, content))
    }
}

#[async_trait]
impl CacheStore for FileCache {
    async fn get_url(&self, url: &str) -> Result<String> {
        if let Some(entry) = self.index.find(url).await? {
            if fs::try_exists(self.cache_dir.join(&entry.file_path)).await? {
                self.index.touch(url).await?;
                debug!(url = %url, "Cache hit");
                return Ok(entry.file_path);
            }
            warn!(url = %url, file_path = %entry.file_path, "Indexed file missing on disk, refetching");
        }

        let (file_path, _) = self.fill(url).await?;
        Ok(file_path)
    }

    async fn get_content(&self, url: &str) -> Result<CachedContent> {
        if let Some(entry) = self.index.find(url).await? {
            match fs::read(self.cache_dir.join(&entry.file_path)).await {
                Ok(data) => {
                    self.index.touch(url).await?;
                    debug!(url = %url, "Cache hit");
                    return Ok(CachedContent {
                        data,
                        content_type: entry.content_type,
                    });
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(url = %url, file_path = %entry.file_path, "Indexed file missing on disk, refetching");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let (_, content) = self.fill(url).await?;
        Ok(content)
    }
}
