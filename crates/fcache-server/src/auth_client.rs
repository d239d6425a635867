//! Client for the token-issuing auth endpoint

use crate::error::{Result, ServiceError};
use crate::types::TokenResponse;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Per-call bound on a token fetch, so a hung peer cannot stall shutdown
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);
const TOKEN_PATH: &str = "/api/token/get/";

/// A freshly issued token and how long it stays current
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedToken {
    pub token: String,
    pub expires_in: Duration,
}

/// Source of API tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<FetchedToken>;
}

/// Fetches tokens from `{auth_domain}/api/token/get/` using the static API key
pub struct AuthClient {
    client: Client,
    endpoint: String,
    api_token: String,
}

impl AuthClient {
    /// Certificate verification is skipped unless `production` is set
    pub fn new(auth_domain: &str, api_token: &str, production: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .danger_accept_invalid_certs(!production)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", auth_domain.trim_end_matches('/'), TOKEN_PATH),
            api_token: api_token.to_string(),
        })
    }
}

#[async_trait]
impl TokenSource for AuthClient {
    async fn fetch(&self) -> Result<FetchedToken> {
        debug!(endpoint = %self.endpoint, "Requesting API token");

        let response = self
            .client
            .get(&self.endpoint)
            .header("Api-Token", &self.api_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Auth(format!(
                "token endpoint returned status {}",
                response.status()
            )));
        }

        let body: TokenResponse = response.json().await?;
        if body.token.is_empty() {
            return Err(ServiceError::Auth("token endpoint returned an empty token".into()));
        }

        let expires_in = Duration::from_secs(body.expires_in.max(0) as u64);
        info!(expires_in_secs = expires_in.as_secs(), "Obtained API token");

        Ok(FetchedToken {
            token: body.token,
            expires_in,
        })
    }
}
