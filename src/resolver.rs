use std::sync::Arc;
use std::time::Duration;

use crate::core::cache::PriceCache;
use crate::core::error::FetchError;
use crate::core::price::PriceFetcher;

/// Cache-aside lookup of a single pair.
///
/// A hit returns without touching the network. A miss goes to the fetcher and
/// stores the price for `ttl`. Failures are returned as is and never cached.
/// Concurrent misses on the same pair are not coalesced, each one fetches and
/// the last write wins.
#[derive(Clone)]
pub struct PriceResolver {
    cache: Arc<PriceCache>,
    fetcher: Arc<dyn PriceFetcher>,
    ttl: Duration,
}

impl PriceResolver {
    pub fn new(cache: Arc<PriceCache>, fetcher: Arc<dyn PriceFetcher>, ttl: Duration) -> Self {
        Self {
            cache,
            fetcher,
            ttl,
        }
    }

    pub async fn resolve(&self, pair: &str) -> Result<f64, FetchError> {
        if let Some(price) = self.cache.get(pair).await {
            return Ok(price);
        }

        let price = self.fetcher.fetch(pair).await?;
        self.cache.put(pair.to_string(), price, self.ttl).await;
        Ok(price)
    }
}
