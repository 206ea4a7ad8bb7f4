use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtpEntry {
    pub pair: String,
    pub amount: f64,
}

/// Body of `GET /api/v1/ltp`. Only pairs that resolved are listed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LtpResponse {
    pub ltp: Vec<LtpEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
