//! Binance connection settings.

use serde::Deserialize;

/// Endpoints and snapshot depth for Binance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BinanceSettings {
    /// Combined stream endpoint.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// REST base URL for depth snapshots.
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    /// Levels per side requested in a snapshot.
    #[serde(default = "default_snapshot_limit")]
    pub snapshot_limit: u32,
    /// HTTP timeout for snapshot requests.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
}

fn default_ws_url() -> String {
    "wss://stream.binance.com:9443/stream".into()
}

fn default_rest_url() -> String {
    "https://api.binance.com".into()
}

const fn default_snapshot_limit() -> u32 {
    1000
}

const fn default_http_timeout_ms() -> u64 {
    10_000
}

impl Default for BinanceSettings {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            rest_url: default_rest_url(),
            snapshot_limit: default_snapshot_limit(),
            http_timeout_ms: default_http_timeout_ms(),
        }
    }
}
