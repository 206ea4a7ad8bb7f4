//! Failure taxonomy of the upstream price lookup

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Upstream unreachable, timed out, or answered with something that is not a ticker payload.
    #[error("Network error for pair {pair}: {reason}")]
    Network { pair: String, reason: String },

    #[error("Upstream reported errors for pair {pair}: {}", .errors.join(", "))]
    Upstream { pair: String, errors: Vec<String> },

    #[error("Invalid last trade price {value:?} for pair {pair}: {reason}")]
    Parse {
        pair: String,
        value: String,
        reason: String,
    },

    #[error("No price data found for pair: {pair}")]
    NotFound { pair: String },
}

impl FetchError {
    pub fn network(pair: &str, reason: impl ToString) -> Self {
        FetchError::Network {
            pair: pair.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found(pair: &str) -> Self {
        FetchError::NotFound {
            pair: pair.to_string(),
        }
    }
}
