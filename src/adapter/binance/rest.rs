//! Binance REST depth snapshots.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::message::DepthSnapshot;
use super::settings::BinanceSettings;
use crate::domain::Snapshot;
use crate::error::{Error, Result};
use crate::port::SnapshotSource;

/// HTTP client for the Binance depth endpoint.
pub struct BinanceRestClient {
    http: HttpClient,
    base_url: String,
    limit: u32,
}

impl BinanceRestClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, limit: u32) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.into(),
            limit,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &BinanceSettings) -> Self {
        let http = HttpClient::builder()
            .timeout(Duration::from_millis(settings.http_timeout_ms))
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to build HTTP client, using defaults");
                HttpClient::new()
            });

        Self {
            http,
            base_url: settings.rest_url.clone(),
            limit: settings.snapshot_limit,
        }
    }

    /// Depth endpoint URL for a symbol.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the configured base URL is invalid.
    pub fn depth_url(&self, symbol: &str) -> Result<Url> {
        let base = format!("{}/api/v1/depth", self.base_url.trim_end_matches('/'));
        let limit = self.limit.to_string();
        Ok(Url::parse_with_params(
            &base,
            &[("symbol", symbol), ("limit", limit.as_str())],
        )?)
    }
}

/// Client errors that will not go away by asking again.
///
/// Rate limiting (429, and 418 once banned) and request timeouts are
/// retried like any other snapshot failure.
fn is_rejection(status: StatusCode) -> bool {
    status.is_client_error()
        && !matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::IM_A_TEAPOT | StatusCode::TOO_MANY_REQUESTS
        )
}

#[async_trait]
impl SnapshotSource for BinanceRestClient {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<Snapshot> {
        let url = self.depth_url(symbol)?;
        debug!(url = %url, "Fetching depth snapshot");

        let snapshot_error = |reason: String| Error::Snapshot {
            market: symbol.to_string(),
            reason,
        };

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| snapshot_error(e.to_string()))?;

        let status = response.status();
        if is_rejection(status) {
            let body = response.text().await.unwrap_or_default();
            warn!(symbol, status = %status, body = %body, "Depth snapshot rejected");
            return Err(Error::MarketRejected {
                market: symbol.to_string(),
                reason: format!("HTTP {status}: {body}"),
            });
        }
        let response = response
            .error_for_status()
            .map_err(|e| snapshot_error(e.to_string()))?;
        let depth: DepthSnapshot = response
            .json()
            .await
            .map_err(|e| snapshot_error(e.to_string()))?;

        debug!(
            symbol,
            last_update_id = depth.last_update_id,
            asks = depth.asks.len(),
            bids = depth.bids.len(),
            "Got depth snapshot"
        );
        Ok(depth.to_snapshot()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer a single HTTP request with `status` and `body`.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn invalid_symbol_is_rejected_for_good() {
        let base = serve_once("400 Bad Request", r#"{"code":-1121,"msg":"Invalid symbol."}"#).await;
        let client = BinanceRestClient::new(base, 10);

        let err = client.fetch_snapshot("FOOBTC").await.unwrap_err();
        assert!(matches!(&err, Error::MarketRejected { market, .. } if market == "FOOBTC"));
        assert!(err.to_string().contains("Invalid symbol"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn rate_limit_is_retryable() {
        let base = serve_once("429 Too Many Requests", "{}").await;
        let client = BinanceRestClient::new(base, 10);

        let err = client.fetch_snapshot("ETHBTC").await.unwrap_err();
        assert!(matches!(err, Error::Snapshot { .. }));
        assert!(err.is_retryable());
        assert!(!err.is_connection_error());
    }

    #[tokio::test]
    async fn depth_response_becomes_snapshot() {
        let base = serve_once(
            "200 OK",
            r#"{"lastUpdateId":160,"bids":[["0.0024","10"]],"asks":[["0.0026","100"]]}"#,
        )
        .await;
        let client = BinanceRestClient::new(base, 10);

        let snapshot = client.fetch_snapshot("ETHBTC").await.unwrap();
        assert_eq!(snapshot.sequence, Some(160));
        assert_eq!(snapshot.asks.len(), 1);
        assert_eq!(snapshot.bids.len(), 1);
    }

    #[test]
    fn only_permanent_client_errors_reject() {
        assert!(is_rejection(StatusCode::BAD_REQUEST));
        assert!(is_rejection(StatusCode::NOT_FOUND));
        assert!(!is_rejection(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_rejection(StatusCode::IM_A_TEAPOT));
        assert!(!is_rejection(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn depth_url_has_symbol_and_limit() {
        let client = BinanceRestClient::new("https://api.binance.com/", 1000);
        let url = client.depth_url("ETHBTC").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.binance.com/api/v1/depth?symbol=ETHBTC&limit=1000"
        );
    }

    #[test]
    fn invalid_base_url_is_fatal() {
        let client = BinanceRestClient::new("not a url", 10);
        let err = client.depth_url("ETHBTC").unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn from_settings_uses_configured_limit() {
        let settings = BinanceSettings {
            snapshot_limit: 50,
            ..BinanceSettings::default()
        };
        let client = BinanceRestClient::from_settings(&settings);
        assert!(client.depth_url("LTCBTC").unwrap().as_str().ends_with("limit=50"));
    }
}
