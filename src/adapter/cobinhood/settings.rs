//! Cobinhood connection settings.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CobinhoodSettings {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Price aggregation requested for order book channels.
    #[serde(default = "default_precision")]
    pub precision: String,
}

fn default_ws_url() -> String {
    "wss://ws.cobinhood.com/v2/ws".into()
}

fn default_precision() -> String {
    "1E-7".into()
}

impl Default for CobinhoodSettings {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            precision: default_precision(),
        }
    }
}
