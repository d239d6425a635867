//! fcache server library
//!
//! Provides the credential store, token rotation, cache eviction and HTTP
//! dispatch used by the `fcache-server` binary.

pub mod auth_client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod rotation;
pub mod server;
pub mod shutdown;
pub mod sweeper;
pub mod types;

pub use config::Config;
pub use credentials::{CredentialSnapshot, CredentialStore};
pub use error::{ApiError, Result, ServiceError};
pub use server::{create_router, start_server, AppState};
