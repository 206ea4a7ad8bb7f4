//! Pricing abstractions and core types

use async_trait::async_trait;

use super::error::FetchError;

/// Opaque pair identifier, passed to the upstream exactly as requested (e.g. `BTCUSD`).
pub type Pair = String;

/// One lookup of a pair's last traded price against the upstream service.
///
/// Implementations are a pure I/O boundary and never cache.
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    async fn fetch(&self, pair: &str) -> Result<f64, FetchError>;
}
