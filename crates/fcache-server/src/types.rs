//! Wire types for the fcache server

use serde::{Deserialize, Serialize};

/// What a fetch request wants back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// The cached bytes with their content type
    Content,
    /// The cached file's path relative to the cache root
    Url,
}

impl ResponseMode {
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "content" => Some(ResponseMode::Content),
            "url" => Some(ResponseMode::Url),
            _ => None,
        }
    }
}

/// Body of a direct fetch
#[derive(Debug, Deserialize)]
pub struct GetFileRequest {
    #[serde(default)]
    pub url: String,
    /// "content" or "url"
    #[serde(default)]
    pub content_type: String,
}

/// Query parameters of a streamed fetch
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    pub url: Option<String>,
    pub mode: Option<String>,
}

/// Auth endpoint response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: i64,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}
