//! Error types for the fcache server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use file_url_cache::StoreError;
use serde_json::json;
use std::fmt;
use std::time::Duration;

/// Process-level errors: startup, credentials, background tasks
#[derive(Debug)]
pub enum ServiceError {
    Config(String),
    Database(Box<sqlx::Error>),
    Store(StoreError),
    Http(Box<reqwest::Error>),
    Io(Box<std::io::Error>),
    /// Auth endpoint answered, but not with a usable token
    Auth(String),
    /// Token fetch kept failing for the whole retry budget
    CredentialsUnavailable(Duration),
    /// Shutdown was requested before the operation finished
    Interrupted,
    Task(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ServiceError::Database(err) => write!(f, "Database error: {}", err),
            ServiceError::Store(err) => write!(f, "Cache store error: {}", err),
            ServiceError::Http(err) => write!(f, "HTTP error: {}", err),
            ServiceError::Io(err) => write!(f, "IO error: {}", err),
            ServiceError::Auth(msg) => write!(f, "Auth error: {}", msg),
            ServiceError::CredentialsUnavailable(timeout) => {
                write!(f, "No API token obtained within {:?}", timeout)
            }
            ServiceError::Interrupted => write!(f, "Interrupted by shutdown"),
            ServiceError::Task(msg) => write!(f, "Background task failed: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Database(err) => Some(err.as_ref()),
            ServiceError::Store(err) => Some(err),
            ServiceError::Http(err) => Some(err.as_ref()),
            ServiceError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(Box::new(err))
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::Store(err)
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Http(Box::new(err))
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Io(Box::new(err))
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::Task(err.to_string())
    }
}

impl From<tracing_subscriber::filter::ParseError> for ServiceError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServiceError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Request-level errors rendered as HTTP responses
#[derive(Debug)]
pub enum ApiError {
    /// Body could not be decoded
    BadInput,
    InvalidUrl,
    InvalidType,
    InvalidRequest,
    Unauthorized,
    Store(StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadInput
            | ApiError::InvalidUrl
            | ApiError::InvalidType
            | ApiError::InvalidRequest => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadInput => "error decoding input JSON",
            ApiError::InvalidUrl => "invalid URL",
            ApiError::InvalidType => "invalid file type",
            ApiError::InvalidRequest => "invalid request",
            ApiError::Unauthorized => "Authentication required",
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Cache store error");
                "Internal server error"
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}
