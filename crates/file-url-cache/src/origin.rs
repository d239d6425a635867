//! Fetching files from their origin servers

use crate::error::{Result, StoreError};
use crate::types::CachedContent;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// HTTP client for downloading files on a cache miss
#[derive(Clone)]
pub struct OriginFetcher {
    client: Client,
}

impl OriginFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self { client })
    }

    /// Download `url`, returning its bytes and content type
    pub async fn fetch(&self, url: &str) -> Result<CachedContent> {
        debug!(url = %url, "Fetching file from origin");

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), url = %url, "Origin fetch failed");
            return Err(StoreError::Origin(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let data = response.bytes().await?.to_vec();

        debug!(
            size = data.len(),
            content_type = %content_type,
            "Fetched file from origin"
        );

        Ok(CachedContent { data, content_type })
    }
}
