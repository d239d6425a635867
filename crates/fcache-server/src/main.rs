//! fcache - caching front end for remotely fetched files
//!
//! Serves cached copies of remote files by URL, fetching and persisting them
//! on first access. Two background loops run beside the HTTP server: one
//! keeps the service's API token fresh, the other evicts files nobody has
//! read for a while.

use fcache_server::auth_client::AuthClient;
use fcache_server::rotation::TokenRotator;
use fcache_server::shutdown;
use fcache_server::sweeper::Sweeper;
use fcache_server::{create_router, start_server, AppState, Config, Result, ServiceError};
use file_url_cache::{FileCache, OriginFetcher, PgCacheIndex};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("fcache_server=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting fcache...");

    let config = Config::from_env()?;
    info!("Port: {}", config.port);
    info!("Cache dir: {:?}", config.cache_dir);
    info!("Auth domain: {}", config.auth_domain);
    info!("Production: {}", config.production);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown::signal_received().await;
        let _ = signal_tx.send(true);
    });

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    info!("Database connection established");

    let index = Arc::new(PgCacheIndex::new(pool));
    let cache = FileCache::open(index.clone(), config.cache_dir.clone(), OriginFetcher::new()?).await?;
    let sweeper = Sweeper::new(index, cache.cache_dir().to_path_buf());

    // Not ready to serve until the first token is in hand
    let auth = AuthClient::new(&config.auth_domain, &config.api_token, config.production)?;
    let rotator = TokenRotator::new(Arc::new(auth), config.api_token_timeout);
    let (credentials, refresh_at) = rotator.prime(&mut shutdown_rx.clone()).await?;
    let credentials = Arc::new(credentials);

    let rotation = {
        let credentials = credentials.clone();
        let shutdown_rx = shutdown_rx.clone();
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = rotator.run(credentials, refresh_at, shutdown_rx).await;
            if result.is_err() {
                // without a token the service cannot keep authenticating
                let _ = shutdown_tx.send(true);
            }
            result
        })
    };
    let sweep = tokio::spawn(sweeper.run(shutdown_rx.clone()));

    let state = AppState::new(Arc::new(cache), credentials);
    let router = create_router(state, &config.api_base);
    let served = start_server(router, config.port, shutdown_rx).await;

    let _ = shutdown_tx.send(true);
    let rotated = rotation.await?;
    sweep.await?;

    if let Err(e) = served {
        error!(error = %e, "HTTP server error");
        return Err(ServiceError::from(e));
    }
    rotated?;

    info!("fcache stopped");
    Ok(())
}
