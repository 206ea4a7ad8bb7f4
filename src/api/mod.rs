//! HTTP surface of the proxy

pub mod handlers;
pub mod types;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::core::config::DEFAULT_PAIRS;
use crate::resolver::PriceResolver;

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub resolver: PriceResolver,
    pub default_pairs: Arc<[String]>,
}

impl AppState {
    /// An empty `default_pairs` is replaced by [`DEFAULT_PAIRS`].
    pub fn new(resolver: PriceResolver, default_pairs: Vec<String>) -> Self {
        let default_pairs = if default_pairs.is_empty() {
            warn!("No default pairs configured, using {}", DEFAULT_PAIRS.join(","));
            DEFAULT_PAIRS.iter().map(|p| p.to_string()).collect()
        } else {
            default_pairs
        };
        Self {
            resolver,
            default_pairs: default_pairs.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1/ltp", get(handlers::get_ltp))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
