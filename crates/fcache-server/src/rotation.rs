//! Background refresh of the API token
//!
//! Priming fetches the first token before the service starts serving. After
//! that a timer fires at each token's reported expiry, a new token is fetched
//! and the credential store is rotated so the old token falls into its grace
//! window.

use crate::auth_client::{FetchedToken, TokenSource};
use crate::credentials::CredentialStore;
use crate::error::{Result, ServiceError};
use crate::shutdown::cancelled;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{error, info};

const RETRY_INTERVAL: Duration = Duration::from_secs(5);
/// Floor on the refresh timer so a zero expiry cannot spin the loop
const MIN_REFRESH_DELAY: Duration = Duration::from_secs(1);

pub struct TokenRotator {
    source: Arc<dyn TokenSource>,
    timeout: Duration,
    retry_interval: Duration,
}

impl TokenRotator {
    /// `timeout` bounds how long fetching may keep failing before giving up
    pub fn new(source: Arc<dyn TokenSource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            retry_interval: RETRY_INTERVAL,
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Obtain the first token and build the credential store from it.
    ///
    /// Returns the store and the instant the token should be refreshed.
    pub async fn prime(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(CredentialStore, Instant)> {
        let fetched = self.fetch_with_retry(shutdown).await?;
        let refresh_at = refresh_instant(&fetched);
        info!("API token primed");
        Ok((CredentialStore::new(fetched.token, Utc::now()), refresh_at))
    }

    /// Keep the store's token fresh until shutdown.
    ///
    /// Fails only when a refresh exhausts its retry budget.
    pub async fn run(
        self,
        store: Arc<CredentialStore>,
        mut refresh_at: Instant,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = cancelled(&mut shutdown) => {
                    info!("Token rotation stopping");
                    return Ok(());
                }
                _ = sleep_until(refresh_at) => {}
            }

            info!("Refreshing API token");
            let fetched = match self.fetch_with_retry(&mut shutdown).await {
                Ok(fetched) => fetched,
                Err(ServiceError::Interrupted) => {
                    info!("Token rotation stopping");
                    return Ok(());
                }
                Err(e) => {
                    error!(error = %e, "Token refresh failed");
                    return Err(e);
                }
            };

            refresh_at = refresh_instant(&fetched);
            store.rotate(fetched.token);
            let snapshot = store.read();
            info!(grace_until = %snapshot.previous_deadline, "API token rotated");
        }
    }

    async fn fetch_with_retry(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<FetchedToken> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.source.fetch().await {
                Ok(fetched) => return Ok(fetched),
                Err(e) => error!(error = %e, "Failed to fetch API token"),
            }

            tokio::select! {
                _ = cancelled(shutdown) => return Err(ServiceError::Interrupted),
                _ = sleep(self.retry_interval) => {}
            }

            if Instant::now() >= deadline {
                error!(timeout = ?self.timeout, "Giving up on API token");
                return Err(ServiceError::CredentialsUnavailable(self.timeout));
            }
        }
    }
}

fn refresh_instant(fetched: &FetchedToken) -> Instant {
    Instant::now() + fetched.expires_in.max(MIN_REFRESH_DELAY)
}
