//! Error types for the file cache

use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    Http(Box<reqwest::Error>),
    Database(Box<sqlx::Error>),
    Io(Box<std::io::Error>),
    /// Origin answered with a non-success status
    Origin(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Http(err) => write!(f, "HTTP error: {}", err),
            StoreError::Database(err) => write!(f, "Database error: {}", err),
            StoreError::Io(err) => write!(f, "IO error: {}", err),
            StoreError::Origin(msg) => write!(f, "Origin error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Http(err) => Some(err.as_ref()),
            StoreError::Database(err) => Some(err.as_ref()),
            StoreError::Io(err) => Some(err.as_ref()),
            StoreError::Origin(_) => None,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Http(Box::new(err))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(Box::new(err))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
