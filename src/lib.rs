//! Bookfeed - streaming order book ingestion from crypto exchanges.
//!
//! This crate keeps in-memory order books in sync with exchange WebSocket
//! feeds. Every exchange speaks its own protocol; adapters translate them
//! into one stream of snapshots and incremental updates.
//!
//! # Architecture
//!
//! - **`domain`** - Order book sides, markets and book events
//! - **`port`** - The [`ExchangeAdapter`](port::ExchangeAdapter) and
//!   [`SnapshotSource`](port::SnapshotSource) traits
//! - **`adapter`** - Binance, Kraken, Poloniex and Cobinhood implementations
//! - **`lifecycle`** - Reconnect, heartbeat and refresh state machine
//! - **`streamer`** - Routes events to markets and exposes them to callers
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files
//! - [`error`] - Error types for the crate
//! - [`factory`] - Builds a streamer for a configured exchange
//! - [`cli`] - Command-line entry point
//!
//! # Example
//!
//! ```no_run
//! use bookfeed::config::{Config, ExchangeKind};
//! use bookfeed::factory::build_streamer;
//!
//! # async fn example() -> bookfeed::error::Result<()> {
//! let config = Config::default();
//! let streamer = build_streamer(ExchangeKind::Binance, &config);
//! let market = streamer.market("ETH/BTC");
//! let mut updates = market.subscribe();
//!
//! while updates.recv().await.is_ok() {
//!     println!("best ask: {:?}", market.top_asks(1));
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod factory;
pub mod lifecycle;
pub mod port;
pub mod streamer;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
