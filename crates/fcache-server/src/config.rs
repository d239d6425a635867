use crate::error::{Result, ServiceError};
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub cache_dir: PathBuf,
    /// Base URL of the service issuing API tokens
    pub auth_domain: String,
    /// Static key presented to the auth service
    pub api_token: String,
    /// How long token fetching may keep failing before the service gives up
    pub api_token_timeout: Duration,
    /// Non-production skips TLS verification towards the auth service
    pub production: bool,
    /// Path prefix the API routes are mounted under
    pub api_base: String,
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ServiceError::Config(format!("{} environment variable is required", key)))
        };

        let port = match lookup("PORT") {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| ServiceError::Config(format!("invalid PORT: {}", p)))?,
            None => 8080,
        };

        let database_url = required("DATABASE_URL")?;

        let cache_dir = lookup("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./cache/files"));

        let auth_domain = required("AUTH_DOMAIN")?.trim_end_matches('/').to_string();
        let api_token = required("API_TOKEN")?;

        let api_token_timeout = match lookup("API_TOKEN_TIMEOUT_SECS") {
            Some(s) => s.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                ServiceError::Config(format!("invalid API_TOKEN_TIMEOUT_SECS: {}", s))
            })?,
            None => Duration::from_secs(5 * 60),
        };

        let production = lookup("PRODUCTION")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let api_base = lookup("API_BASE").unwrap_or_else(|| "api".to_string());

        Ok(Self {
            port,
            database_url,
            cache_dir,
            auth_domain,
            api_token,
            api_token_timeout,
            production,
            api_base,
        })
    }
}
