//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings. Every
//! field has a default, so an empty file is a valid configuration that
//! streams nothing from Binance.
//!
//! # Example
//!
//! ```no_run
//! use bookfeed::config::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.logging.init();
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use super::logging::LoggingConfig;
use crate::adapter::binance::BinanceSettings;
use crate::adapter::cobinhood::CobinhoodSettings;
use crate::adapter::kraken::KrakenSettings;
use crate::adapter::poloniex::PoloniexSettings;
use crate::domain::MarketName;
use crate::error::{ConfigError, Result};
use crate::lifecycle::LifecycleConfig;
use crate::streamer::StreamerConfig;

/// Supported exchanges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    #[default]
    Binance,
    Kraken,
    Poloniex,
    Cobinhood,
}

impl ExchangeKind {
    pub const ALL: [Self; 4] = [Self::Binance, Self::Kraken, Self::Poloniex, Self::Cobinhood];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Kraken => "kraken",
            Self::Poloniex => "poloniex",
            Self::Cobinhood => "cobinhood",
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownExchange(s.to_string()))
    }
}

/// Reconnect timing and buffer sizes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// First reconnect delay; doubles per consecutive failure.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Forced reconnect interval.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Limit on opening the transport, handshake included.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Buffer between the connection task and the dispatch loop.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Per-market change notification buffer.
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

const fn default_base_delay_ms() -> u64 {
    100
}

const fn default_refresh_interval_secs() -> u64 {
    30 * 60
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

const fn default_channel_capacity() -> usize {
    1024
}

const fn default_notification_capacity() -> usize {
    256
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            refresh_interval_secs: default_refresh_interval_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            notification_capacity: default_notification_capacity(),
        }
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            base_delay: Duration::from_millis(self.base_delay_ms),
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    #[must_use]
    pub fn streamer_config(&self) -> StreamerConfig {
        StreamerConfig {
            lifecycle: self.lifecycle_config(),
            event_capacity: self.channel_capacity,
            notification_capacity: self.notification_capacity,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeKind,
    /// Markets to stream, as `ASSET/CURRENCY`.
    #[serde(default)]
    pub markets: Vec<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub binance: BinanceSettings,
    #[serde(default)]
    pub kraken: KrakenSettings,
    #[serde(default)]
    pub poloniex: PoloniexSettings,
    #[serde(default)]
    pub cobinhood: CobinhoodSettings,
}

impl Config {
    /// Parse and validate configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] or [`ConfigError::MissingField`]
    /// for the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.connection.base_delay_ms == 0 {
            return Err(invalid("connection.base_delay_ms", "must be greater than 0"));
        }
        if self.connection.refresh_interval_secs == 0 {
            return Err(invalid("connection.refresh_interval_secs", "must be greater than 0"));
        }
        if self.connection.connect_timeout_ms == 0 {
            return Err(invalid("connection.connect_timeout_ms", "must be greater than 0"));
        }
        if self.connection.channel_capacity == 0 {
            return Err(invalid("connection.channel_capacity", "must be greater than 0"));
        }
        if self.connection.notification_capacity == 0 {
            return Err(invalid("connection.notification_capacity", "must be greater than 0"));
        }
        for market in &self.markets {
            MarketName::parse(market).map_err(|e| ConfigError::InvalidValue {
                field: "markets",
                reason: e.to_string(),
            })?;
        }

        let ws_url = match self.exchange {
            ExchangeKind::Binance => {
                if self.binance.rest_url.is_empty() {
                    return Err(ConfigError::MissingField { field: "binance.rest_url" }.into());
                }
                &self.binance.ws_url
            }
            ExchangeKind::Kraken => &self.kraken.ws_url,
            ExchangeKind::Poloniex => {
                self.poloniex.validate()?;
                &self.poloniex.ws_url
            }
            ExchangeKind::Cobinhood => &self.cobinhood.ws_url,
        };
        if ws_url.is_empty() {
            return Err(ConfigError::MissingField { field: "ws_url" }.into());
        }
        Ok(())
    }

    /// Configured markets as [`MarketName`]s.
    #[must_use]
    pub fn market_names(&self) -> Vec<MarketName> {
        self.markets.iter().map(|m| MarketName::new(m.as_str())).collect()
    }
}

fn invalid(field: &'static str, reason: &str) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
    .into()
}
