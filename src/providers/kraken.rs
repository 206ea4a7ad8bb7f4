use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::error::FetchError;
use crate::core::price::PriceFetcher;

const TICKER_ENDPOINT: &str = "/0/public/Ticker";

/// Fetches last traded prices from Kraken's public ticker endpoint.
pub struct KrakenProvider {
    base_url: String,
    client: reqwest::Client,
}

impl KrakenProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ltp-proxy/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(KrakenProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: Option<HashMap<String, TickerInfo>>,
}

#[derive(Debug, Deserialize)]
struct TickerInfo {
    /// Last trade closed: `[price, lot volume]`
    #[serde(default)]
    c: Vec<String>,
}

/// Maps a Kraken pair name onto a comparable form, e.g. `XXBTZUSD` and `XBTUSD` both become `BTCUSD`.
fn normalize_pair(name: &str) -> String {
    let upper = name.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    let stripped = if bytes.len() == 8
        && matches!(bytes[0], b'X' | b'Z')
        && matches!(bytes[4], b'X' | b'Z')
    {
        format!("{}{}", &upper[1..4], &upper[5..8])
    } else {
        upper
    };
    stripped.replace("XBT", "BTC").replace("XDG", "DOGE")
}

/// Picks the ticker entry belonging to `pair`.
///
/// Kraken keys the result by its own pair name, which rarely equals the requested
/// one, so an exact key match is tried first, then a normalized match, and a
/// single-entry result is accepted as is. Several normalized matches are
/// ambiguous and select nothing.
fn select_ticker<'a>(
    pair: &str,
    result: &'a HashMap<String, TickerInfo>,
) -> Option<(&'a str, &'a TickerInfo)> {
    if let Some((key, info)) = result.get_key_value(pair) {
        return Some((key.as_str(), info));
    }

    let wanted = normalize_pair(pair);
    let mut matches = result
        .iter()
        .filter(|(key, _)| normalize_pair(key) == wanted);
    match (matches.next(), matches.next()) {
        (Some((key, info)), None) => return Some((key.as_str(), info)),
        (Some(_), Some(_)) => return None,
        _ => {}
    }

    if result.len() == 1 {
        return result.iter().next().map(|(key, info)| (key.as_str(), info));
    }
    None
}

fn parse_price(pair: &str, raw: &str) -> Result<f64, FetchError> {
    let parse_error = |reason: String| FetchError::Parse {
        pair: pair.to_string(),
        value: raw.to_string(),
        reason,
    };

    let price = raw
        .trim()
        .parse::<f64>()
        .map_err(|e| parse_error(e.to_string()))?;
    if !price.is_finite() {
        return Err(parse_error("not a finite number".to_string()));
    }
    Ok(price)
}

#[async_trait]
impl PriceFetcher for KrakenProvider {
    #[instrument(
        name = "KrakenTickerFetch",
        skip(self),
        fields(pair = %pair)
    )]
    async fn fetch(&self, pair: &str) -> Result<f64, FetchError> {
        let endpoint = format!("{}{}", self.base_url, TICKER_ENDPOINT);
        let url = Url::parse_with_params(&endpoint, &[("pair", pair)])
            .map_err(|e| FetchError::network(pair, format!("Invalid upstream URL {endpoint}: {e}")))?;
        debug!("Requesting ticker from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::network(pair, format!("Request error: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FetchError::network(pair, format!("Failed to read response body: {e}")))?;

        let data: TickerResponse = match serde_json::from_str(&text) {
            Ok(data) => data,
            Err(e) if status.is_success() => {
                return Err(FetchError::network(
                    pair,
                    format!("Failed to parse ticker response: {e}"),
                ));
            }
            Err(_) => return Err(FetchError::network(pair, format!("HTTP error: {status}"))),
        };

        if !data.error.is_empty() {
            return Err(FetchError::Upstream {
                pair: pair.to_string(),
                errors: data.error,
            });
        }
        if !status.is_success() {
            return Err(FetchError::network(pair, format!("HTTP error: {status}")));
        }

        let result = data.result.unwrap_or_default();
        let (key, ticker) = select_ticker(pair, &result).ok_or_else(|| FetchError::not_found(pair))?;
        let raw = ticker.c.first().ok_or_else(|| FetchError::not_found(pair))?;

        let price = parse_price(pair, raw)?;
        debug!(upstream_key = %key, price, "Received last trade price");
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(pair: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TICKER_ENDPOINT))
            .and(query_param("pair", pair))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn provider(mock_server: &MockServer) -> KrakenProvider {
        KrakenProvider::new(&mock_server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_normalize_pair() {
        assert_eq!(normalize_pair("XXBTZUSD"), "BTCUSD");
        assert_eq!(normalize_pair("XBTCHF"), "BTCCHF");
        assert_eq!(normalize_pair("btcusd"), "BTCUSD");
        assert_eq!(normalize_pair("XETHZEUR"), "ETHEUR");
        assert_eq!(normalize_pair("XDGUSD"), "DOGEUSD");
    }

    #[tokio::test]
    async fn test_successful_price_fetch() {
        let body = r#"{
            "error": [],
            "result": {
                "XXBTZUSD": {
                    "a": ["64214.00000", "1", "1.000"],
                    "b": ["64213.90000", "2", "2.000"],
                    "c": ["64213.50000", "0.00150000"]
                }
            }
        }"#;
        let mock_server = create_mock_server("BTCUSD", 200, body).await;

        let price = provider(&mock_server).fetch("BTCUSD").await.unwrap();
        assert_eq!(price, 64213.5);
    }

    #[tokio::test]
    async fn test_fetch_selects_entry_matching_pair() {
        let body = r#"{
            "error": [],
            "result": {
                "XETHZUSD": { "c": ["3100.10", "1.0"] },
                "XXBTZEUR": { "c": ["59000.25", "0.1"] },
                "XBTCHF": { "c": ["57000.75", "0.2"] }
            }
        }"#;
        let mock_server = create_mock_server("BTCEUR", 200, body).await;

        let price = provider(&mock_server).fetch("BTCEUR").await.unwrap();
        assert_eq!(price, 59000.25);
    }

    #[tokio::test]
    async fn test_fetch_ambiguous_result_is_not_found() {
        let body = r#"{
            "error": [],
            "result": {
                "XETHZUSD": { "c": ["3100.10", "1.0"] },
                "XLTCZUSD": { "c": ["80.00", "1.0"] }
            }
        }"#;
        let mock_server = create_mock_server("BTCUSD", 200, body).await;

        let result = provider(&mock_server).fetch("BTCUSD").await;
        assert_eq!(result, Err(FetchError::not_found("BTCUSD")));
    }

    #[tokio::test]
    async fn test_fetch_duplicate_normalized_keys_is_not_found() {
        let body = r#"{
            "error": [],
            "result": {
                "XBTUSD": { "c": ["64000.00", "1.0"] },
                "XXBTZUSD": { "c": ["64100.00", "1.0"] }
            }
        }"#;
        let mock_server = create_mock_server("BTCUSD", 200, body).await;

        let result = provider(&mock_server).fetch("BTCUSD").await;
        assert_eq!(result, Err(FetchError::not_found("BTCUSD")));
    }

    #[tokio::test]
    async fn test_upstream_error_payload() {
        let body = r#"{"error": ["EQuery:Unknown asset pair"]}"#;
        let mock_server = create_mock_server("FOOBAR", 200, body).await;

        let result = provider(&mock_server).fetch("FOOBAR").await;
        assert_eq!(
            result,
            Err(FetchError::Upstream {
                pair: "FOOBAR".to_string(),
                errors: vec!["EQuery:Unknown asset pair".to_string()],
            })
        );
    }

    #[tokio::test]
    async fn test_empty_result_is_not_found() {
        let body = r#"{"error": [], "result": {}}"#;
        let mock_server = create_mock_server("BTCUSD", 200, body).await;

        let result = provider(&mock_server).fetch("BTCUSD").await;
        assert_eq!(result, Err(FetchError::not_found("BTCUSD")));
    }

    #[tokio::test]
    async fn test_missing_last_trade_field_is_not_found() {
        let body = r#"{"error": [], "result": {"XXBTZUSD": {"a": ["1.0", "1", "1.000"]}}}"#;
        let mock_server = create_mock_server("BTCUSD", 200, body).await;

        let result = provider(&mock_server).fetch("BTCUSD").await;
        assert_eq!(result, Err(FetchError::not_found("BTCUSD")));
    }

    #[tokio::test]
    async fn test_unparsable_price_is_parse_error() {
        let body = r#"{"error": [], "result": {"XXBTZUSD": {"c": ["not-a-number", "1"]}}}"#;
        let mock_server = create_mock_server("BTCUSD", 200, body).await;

        let result = provider(&mock_server).fetch("BTCUSD").await;
        match result {
            Err(FetchError::Parse { pair, value, .. }) => {
                assert_eq!(pair, "BTCUSD");
                assert_eq!(value, "not-a-number");
            }
            other => panic!("Expected parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_finite_price_is_parse_error() {
        let body = r#"{"error": [], "result": {"XXBTZUSD": {"c": ["NaN", "1"]}}}"#;
        let mock_server = create_mock_server("BTCUSD", 200, body).await;

        let result = provider(&mock_server).fetch("BTCUSD").await;
        assert!(matches!(result, Err(FetchError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_server_error_without_body_is_network_error() {
        let mock_server = create_mock_server("BTCUSD", 500, "").await;

        let result = provider(&mock_server).fetch("BTCUSD").await;
        assert_eq!(
            result,
            Err(FetchError::network(
                "BTCUSD",
                "HTTP error: 500 Internal Server Error"
            ))
        );
    }

    #[tokio::test]
    async fn test_server_error_with_error_payload_is_upstream_error() {
        let body = r#"{"error": ["EService:Unavailable"]}"#;
        let mock_server = create_mock_server("BTCUSD", 503, body).await;

        let result = provider(&mock_server).fetch("BTCUSD").await;
        assert!(matches!(result, Err(FetchError::Upstream { .. })));
    }

    #[tokio::test]
    async fn test_malformed_body_is_network_error() {
        let mock_server = create_mock_server("BTCUSD", 200, "<html>oops</html>").await;

        let result = provider(&mock_server).fetch("BTCUSD").await;
        match result {
            Err(FetchError::Network { reason, .. }) => {
                assert!(reason.contains("Failed to parse ticker response"));
            }
            other => panic!("Expected network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_network_error() {
        // Grab a free port and release it so nothing is listening there
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let uri = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let provider = KrakenProvider::new(&uri, Duration::from_secs(1)).unwrap();
        let result = provider.fetch("BTCUSD").await;
        assert!(matches!(result, Err(FetchError::Network { .. })));
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TICKER_ENDPOINT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"error": [], "result": {}}"#)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let provider = KrakenProvider::new(&mock_server.uri(), Duration::from_millis(50)).unwrap();
        let result = provider.fetch("BTCUSD").await;
        assert!(matches!(result, Err(FetchError::Network { .. })));
    }
}
