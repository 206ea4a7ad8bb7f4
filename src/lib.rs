pub mod api;
pub mod cli;
pub mod core;
pub mod providers;
pub mod resolver;

pub use crate::core::config;

use crate::config::AppConfig;
use crate::core::cache::PriceCache;
use crate::providers::KrakenProvider;
use crate::resolver::PriceResolver;
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tracing::{debug, info};

/// Wires cache, upstream and resolver into the HTTP router.
pub fn build_app(config: &AppConfig) -> Result<Router> {
    let cache = Arc::new(PriceCache::new());
    let fetcher = Arc::new(KrakenProvider::new(
        &config.upstream.base_url,
        config.upstream_timeout(),
    )?);
    let resolver = PriceResolver::new(cache, fetcher, config.cache_ttl());
    let state = api::AppState::new(resolver, config.default_pairs.clone());

    Ok(api::router(state))
}

pub async fn serve(config_path: Option<&str>) -> Result<()> {
    info!("LTP proxy starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let app = build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("Starting server on {}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
