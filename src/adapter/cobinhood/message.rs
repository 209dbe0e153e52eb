//! Cobinhood wire types.
//!
//! Every frame has a header `h` of `[channel, version, type, ...]` and a
//! body `d`:
//! ```json
//! {"h":["order-book.ETH-BTC.1E-7","2","s"],"d":{"asks":[["0.0305","2","1.2"]],"bids":[]}}
//! ```
//! Book entries are `[price, order count, size]`. In `u` frames the size is
//! a signed change to the level.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::money::parse_decimal;
use crate::domain::{BookUpdate, MarketName, OrderBookRecord, OrderEvent, Snapshot};
use crate::error::DataError;

/// Standard `ETH/BTC` to the trading pair id `ETH-BTC`.
///
/// # Errors
///
/// Returns [`DataError::InvalidMarketName`] if the name is not `ASSET/CURRENCY`.
pub fn to_native(market: &MarketName) -> Result<String, DataError> {
    let market = MarketName::parse(&market.as_str().to_uppercase())?;
    Ok(format!("{}-{}", market.asset(), market.currency()))
}

#[must_use]
pub fn to_standard(pair: &str) -> MarketName {
    MarketName::new(pair.replacen('-', "/", 1))
}

#[derive(Debug, Serialize)]
pub struct SubscribeRequest {
    pub action: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub trading_pair_id: String,
    pub precision: String,
}

impl SubscribeRequest {
    pub fn order_book(trading_pair_id: String, precision: String) -> Self {
        Self {
            action: "subscribe",
            kind: "order-book",
            trading_pair_id,
            precision,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CobinhoodMessage {
    pub h: Vec<String>,
    #[serde(default)]
    pub d: Value,
}

/// What a frame means once its header is read.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    Snapshot { pair: String },
    Update { pair: String },
    Subscribed,
    Pong,
    Error(String),
    Other(String),
}

impl CobinhoodMessage {
    /// Trading pair id from an `order-book.PAIR.PRECISION` channel.
    #[must_use]
    pub fn pair(&self) -> Option<&str> {
        let channel = self.h.first()?;
        let mut parts = channel.split('.');
        match (parts.next(), parts.next()) {
            (Some("order-book"), Some(pair)) if !pair.is_empty() => Some(pair),
            _ => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> FrameKind {
        let kind = self.h.get(2).map_or("", String::as_str);
        match (kind, self.pair()) {
            ("s", Some(pair)) => FrameKind::Snapshot { pair: pair.to_string() },
            ("u", Some(pair)) => FrameKind::Update { pair: pair.to_string() },
            ("subscribed", _) => FrameKind::Subscribed,
            ("pong", _) => FrameKind::Pong,
            ("error", _) => FrameKind::Error(self.h[3..].join(" ")),
            (other, _) => FrameKind::Other(other.to_string()),
        }
    }

    fn book(&self) -> Result<BookData, DataError> {
        BookData::deserialize(&self.d).map_err(|e| DataError::Malformed(e.to_string()))
    }

    /// Body of an `s` frame as a snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`DataError`] if the body is not an order book.
    pub fn to_snapshot(&self) -> Result<Snapshot, DataError> {
        let book = self.book()?;
        Ok(Snapshot::new(records(&book.asks)?, records(&book.bids)?))
    }

    /// Body of a `u` frame as signed size changes.
    ///
    /// # Errors
    ///
    /// Returns a [`DataError`] if the body is not an order book.
    pub fn to_update(&self) -> Result<BookUpdate, DataError> {
        let book = self.book()?;
        Ok(BookUpdate::new(deltas(&book.asks)?, deltas(&book.bids)?))
    }
}

type Entry = (String, String, String);

#[derive(Debug, Default, Deserialize)]
struct BookData {
    #[serde(default)]
    asks: Vec<Entry>,
    #[serde(default)]
    bids: Vec<Entry>,
}

fn records(entries: &[Entry]) -> Result<Vec<OrderBookRecord>, DataError> {
    entries
        .iter()
        .map(|(price, _, size)| {
            Ok(OrderBookRecord::new(
                parse_decimal("price", price)?,
                parse_decimal("size", size)?,
            ))
        })
        .collect()
}

fn deltas(entries: &[Entry]) -> Result<Vec<OrderEvent>, DataError> {
    entries
        .iter()
        .map(|(price, _, size)| {
            Ok(OrderEvent::delta(
                parse_decimal("price", price)?,
                parse_decimal("size", size)?,
            ))
        })
        .collect()
}
