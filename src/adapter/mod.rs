//! Exchange adapters.
//!
//! Each exchange module translates its wire protocol into [`AdapterEvent`]s
//! and implements [`ExchangeAdapter`]. Shared pieces live next to them:
//! the WebSocket transport, level array decoding and sequence tracking.
//!
//! [`AdapterEvent`]: crate::port::AdapterEvent
//! [`ExchangeAdapter`]: crate::port::ExchangeAdapter

pub mod binance;
pub mod cobinhood;
pub mod kraken;
pub mod level;
pub mod poloniex;
pub mod sequence;
pub mod transport;
