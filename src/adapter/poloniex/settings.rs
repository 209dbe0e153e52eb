//! Poloniex connection settings and channel reference data.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoloniexSettings {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    /// Native pair (e.g. `BTC_ETH`) to order book channel id.
    #[serde(default = "default_channels")]
    pub channels: BTreeMap<String, u64>,
}

fn default_ws_url() -> String {
    "wss://api2.poloniex.com".into()
}

const fn default_heartbeat_timeout_ms() -> u64 {
    1500
}

fn default_channels() -> BTreeMap<String, u64> {
    [
        ("BTC_DOGE", 27),
        ("BTC_LTC", 50),
        ("BTC_XMR", 114),
        ("BTC_XRP", 117),
        ("USDT_BTC", 121),
        ("USDT_LTC", 123),
        ("BTC_ETH", 148),
        ("USDT_ETH", 149),
    ]
    .into_iter()
    .map(|(pair, id)| (pair.to_string(), id))
    .collect()
}

impl Default for PoloniexSettings {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            channels: default_channels(),
        }
    }
}

impl PoloniexSettings {
    /// Check the channel table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the table is empty, a pair is
    /// not `CURRENCY_ASSET`, or two pairs share a channel id.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "poloniex.channels",
                reason: "channel table must not be empty".into(),
            });
        }

        let mut seen = HashSet::new();
        for (pair, id) in &self.channels {
            if !matches!(pair.split_once('_'), Some((c, a)) if !c.is_empty() && !a.is_empty()) {
                return Err(ConfigError::InvalidValue {
                    field: "poloniex.channels",
                    reason: format!("pair '{pair}' is not CURRENCY_ASSET"),
                });
            }
            if !seen.insert(*id) {
                return Err(ConfigError::InvalidValue {
                    field: "poloniex.channels",
                    reason: format!("channel id {id} is used more than once"),
                });
            }
        }
        Ok(())
    }
}
