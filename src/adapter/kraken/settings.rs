//! Kraken connection settings.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KrakenSettings {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Book depth requested per subscription.
    #[serde(default = "default_depth")]
    pub depth: u32,
    /// Silence after which the connection is considered dead.
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
}

fn default_ws_url() -> String {
    "wss://ws.kraken.com".into()
}

const fn default_depth() -> u32 {
    10
}

const fn default_heartbeat_timeout_ms() -> u64 {
    1500
}

impl Default for KrakenSettings {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            depth: default_depth(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
        }
    }
}
