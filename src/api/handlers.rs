use axum::{
    Json,
    extract::{Query, State},
};
use futures::future::join_all;
use tracing::{debug, warn};

use super::AppState;
use super::types::{HealthResponse, LtpEntry, LtpResponse};
use crate::resolver::PriceResolver;

// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/v1/ltp?pairs=A,B,C`
///
/// Always answers 200. Pairs that fail to resolve are logged and left out of
/// the body. When `pairs` is repeated the first occurrence wins.
pub async fn get_ltp(
    State(state): State<AppState>,
    query: Option<Query<Vec<(String, String)>>>,
) -> Json<LtpResponse> {
    let param = query.as_ref().and_then(|Query(params)| {
        params
            .iter()
            .find(|(key, _)| key == "pairs")
            .map(|(_, value)| value.as_str())
    });
    let pairs = requested_pairs(param, &state.default_pairs);
    Json(aggregate(&state.resolver, pairs).await)
}

/// Splits the comma separated `pairs` parameter, falling back to `defaults`
/// when it is absent or names no pair at all.
pub fn requested_pairs(param: Option<&str>, defaults: &[String]) -> Vec<String> {
    let pairs: Vec<String> = param
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(str::to_string)
        .collect();

    if pairs.is_empty() {
        defaults.to_vec()
    } else {
        pairs
    }
}

/// Resolves every pair on its own task and waits for all of them.
///
/// The tasks are detached from the request: if the caller goes away they still
/// run to completion and fill the cache. Outcomes come back through the join
/// handles and the response is assembled here, sequentially.
pub async fn aggregate(resolver: &PriceResolver, pairs: Vec<String>) -> LtpResponse {
    let requested = pairs.len();
    let handles = pairs.iter().cloned().map(|pair| {
        let resolver = resolver.clone();
        tokio::spawn(async move { resolver.resolve(&pair).await })
    });
    let outcomes = join_all(handles).await;

    let mut ltp = Vec::with_capacity(requested);
    for (pair, outcome) in pairs.into_iter().zip(outcomes) {
        match outcome {
            Ok(Ok(amount)) => ltp.push(LtpEntry { pair, amount }),
            Ok(Err(e)) => warn!(pair = %pair, error = %e, "Failed to fetch LTP"),
            Err(e) => warn!(pair = %pair, error = %e, "LTP task failed"),
        }
    }

    debug!(requested, resolved = ltp.len(), "LTP batch complete");
    LtpResponse { ltp }
}
