//! Construction of adapters and streamers from configuration.

use std::sync::Arc;

use tracing::info;

use crate::adapter::binance::{BinanceAdapter, BinanceRestClient};
use crate::adapter::cobinhood::CobinhoodAdapter;
use crate::adapter::kraken::KrakenAdapter;
use crate::adapter::poloniex::PoloniexAdapter;
use crate::config::{Config, ExchangeKind};
use crate::port::ExchangeAdapter;
use crate::streamer::Streamer;

/// Build the adapter for an exchange.
#[must_use]
pub fn build_adapter(kind: ExchangeKind, config: &Config) -> Box<dyn ExchangeAdapter> {
    match kind {
        ExchangeKind::Binance => {
            let snapshots = Arc::new(BinanceRestClient::from_settings(&config.binance));
            Box::new(BinanceAdapter::new(&config.binance, snapshots))
        }
        ExchangeKind::Kraken => Box::new(KrakenAdapter::new(&config.kraken)),
        ExchangeKind::Poloniex => Box::new(PoloniexAdapter::new(&config.poloniex)),
        ExchangeKind::Cobinhood => Box::new(CobinhoodAdapter::new(&config.cobinhood)),
    }
}

/// Start a streamer for an exchange. Must be called within a tokio runtime.
#[must_use]
pub fn build_streamer(kind: ExchangeKind, config: &Config) -> Streamer {
    info!(exchange = %kind, "Building streamer");
    Streamer::spawn(
        build_adapter(kind, config),
        config.connection.streamer_config(),
    )
}
