//! Periodic eviction of cache entries nobody has read recently
//!
//! Each sweep computes a threshold of `now - retention`, deletes the files of
//! every index entry last read before it, then bulk-deletes the index rows
//! matching the same predicate. The bulk delete re-evaluates the predicate
//! instead of removing the rows read earlier, so an entry read again between
//! the two steps keeps its row; its file may already be gone, which the cache
//! store repairs by refetching on the next access.

use crate::shutdown::cancelled;
use chrono::{DateTime, TimeDelta, Utc};
use file_url_cache::{CacheIndex, Result};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

const SWEEP_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Entries unread for this long are eligible for eviction
pub fn retention_window() -> TimeDelta {
    TimeDelta::days(4)
}

/// Outcome of one sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub candidates: usize,
    pub files_removed: usize,
    pub rows_removed: u64,
}

pub struct Sweeper {
    index: Arc<dyn CacheIndex>,
    cache_dir: PathBuf,
    retention: TimeDelta,
    period: Duration,
}

impl Sweeper {
    pub fn new(index: Arc<dyn CacheIndex>, cache_dir: PathBuf) -> Self {
        Self {
            index,
            cache_dir,
            retention: retention_window(),
            period: SWEEP_PERIOD,
        }
    }

    pub fn with_retention(mut self, retention: TimeDelta) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Sweep on every period tick until shutdown; the first tick is one period out
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        loop {
            tokio::select! {
                _ = cancelled(&mut shutdown) => {
                    info!("Cache sweeper stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }

            info!("Cache sweep starting");
            match self.sweep_at(Utc::now()).await {
                Ok(report) => info!(
                    candidates = report.candidates,
                    files_removed = report.files_removed,
                    rows_removed = report.rows_removed,
                    "Cache sweep finished"
                ),
                Err(e) => error!(error = %e, "Cache sweep aborted"),
            }
        }
    }

    /// One sweep with `now` as the reference time.
    ///
    /// Index failures abort the sweep; file deletion failures are logged and skipped.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let threshold = now - self.retention;

        let paths = self.index.expired_paths(threshold).await?;
        let mut report = SweepReport {
            candidates: paths.len(),
            ..Default::default()
        };

        for relative in &paths {
            let path = self.cache_dir.join(relative);
            match fs::remove_file(&path).await {
                Ok(()) => {
                    report.files_removed += 1;
                    debug!(path = ?path, "Removed expired file");
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(path = ?path, "Expired file already gone");
                }
                Err(e) => warn!(path = ?path, error = %e, "Failed to remove expired file"),
            }
        }

        report.rows_removed = self.index.delete_expired(threshold).await?;
        Ok(report)
    }
}
