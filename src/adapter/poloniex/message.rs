//! Poloniex wire types.
//!
//! Book frames are `[channel, sequence, [entry, ...]]` where each entry is
//! one of:
//! ```json
//! ["i", {"currencyPair": "BTC_ETH", "orderBook": [{"0.0305": "1.2"}, {"0.0304": "3"}]}]
//! ["o", 0, "0.0305", "0.00000000"]
//! ["t", "1234", 1, "0.0305", "0.5", 1534614248]
//! ```
//! `[1010]` is a heartbeat.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::domain::money::parse_decimal;
use crate::domain::{BookUpdate, MarketName, OrderBookRecord, OrderEvent, Quantity, Side, Snapshot};
use crate::error::DataError;

/// Channel id Poloniex uses for heartbeats.
pub const HEARTBEAT_CHANNEL: u64 = 1010;

/// Standard `ETH/BTC` to native `BTC_ETH`.
///
/// # Errors
///
/// Returns [`DataError::InvalidMarketName`] if the name is not `ASSET/CURRENCY`.
pub fn to_native(market: &MarketName) -> Result<String, DataError> {
    let market = MarketName::parse(&market.as_str().to_uppercase())?;
    Ok(format!("{}_{}", market.currency(), market.asset()))
}

/// Native `BTC_ETH` to standard `ETH/BTC`.
///
/// # Errors
///
/// Returns [`DataError::InvalidMarketName`] if the pair is not `CURRENCY_ASSET`.
pub fn to_standard(pair: &str) -> Result<MarketName, DataError> {
    match pair.split_once('_') {
        Some((currency, asset)) if !currency.is_empty() && !asset.is_empty() => {
            Ok(MarketName::from_parts(asset, currency))
        }
        _ => Err(DataError::InvalidMarketName(pair.to_string())),
    }
}

/// Build a `{"command": method, ...args}` control frame.
///
/// # Errors
///
/// Returns [`DataError::Malformed`] if `args` is neither an object nor null.
pub fn command(method: &str, args: Value) -> Result<Value, DataError> {
    let mut frame = match args {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(DataError::Malformed(format!(
                "command arguments must be an object, got {other}"
            )))
        }
    };
    frame.insert("command".into(), Value::String(method.to_string()));
    Ok(Value::Object(frame))
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PoloniexFrame {
    Heartbeat,
    /// Subscription acknowledgement `[channel, 1]`.
    Ack { channel: u64 },
    Book {
        channel: u64,
        sequence: u64,
        entries: Vec<BookEntry>,
    },
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookEntry {
    Initial { pair: String, snapshot: Snapshot },
    /// Side code 0 is the ask side.
    Order(Side, OrderEvent),
    Trade,
    /// An entry type or side code this adapter does not understand.
    Unknown(DataError),
}

#[derive(Debug, Deserialize)]
struct InitialPayload {
    #[serde(rename = "currencyPair")]
    currency_pair: String,
    #[serde(rename = "orderBook")]
    order_book: (HashMap<String, String>, HashMap<String, String>),
}

fn malformed(what: &str) -> DataError {
    DataError::Malformed(what.to_string())
}

fn book_records(levels: &HashMap<String, String>) -> Result<Vec<OrderBookRecord>, DataError> {
    levels
        .iter()
        .map(|(rate, quantity)| {
            Ok(OrderBookRecord::new(
                parse_decimal("rate", rate)?,
                parse_decimal("quantity", quantity)?,
            ))
        })
        .collect()
}

fn str_at<'a>(entry: &'a [Value], index: usize, what: &str) -> Result<&'a str, DataError> {
    entry
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(what))
}

impl BookEntry {
    fn parse(value: Value) -> Result<Self, DataError> {
        let Value::Array(entry) = value else {
            return Err(malformed("book entry is not an array"));
        };
        match str_at(&entry, 0, "book entry without type")? {
            "i" => {
                let payload = entry
                    .get(1)
                    .cloned()
                    .ok_or_else(|| malformed("initial entry without payload"))?;
                let payload: InitialPayload = serde_json::from_value(payload)
                    .map_err(|e| DataError::Malformed(e.to_string()))?;
                let (asks, bids) = &payload.order_book;
                Ok(Self::Initial {
                    pair: payload.currency_pair,
                    snapshot: Snapshot::new(book_records(asks)?, book_records(bids)?),
                })
            }
            "o" => {
                let side = match entry.get(1) {
                    Some(code) if code.as_u64() == Some(0) => Side::Ask,
                    Some(code) if code.as_u64() == Some(1) => Side::Bid,
                    Some(code) => {
                        return Ok(Self::Unknown(DataError::UnknownEventType(format!(
                            "order side {code}"
                        ))))
                    }
                    None => return Err(malformed("order entry without side")),
                };
                let rate = parse_decimal("rate", str_at(&entry, 2, "order entry without rate")?)?;
                let quantity =
                    parse_decimal("quantity", str_at(&entry, 3, "order entry without quantity")?)?;
                let event = if quantity > Quantity::ZERO {
                    OrderEvent::level(rate, quantity)
                } else {
                    OrderEvent::delete(rate)
                };
                Ok(Self::Order(side, event))
            }
            "t" => Ok(Self::Trade),
            other => Ok(Self::Unknown(DataError::UnknownEventType(format!(
                "entry '{other}'"
            )))),
        }
    }
}

impl PoloniexFrame {
    /// Decode a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Malformed`] for JSON that matches no known shape.
    pub fn parse(text: &str) -> Result<Self, DataError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DataError::Malformed(e.to_string()))?;

        match value {
            Value::Object(map) => match map.get("error") {
                Some(error) => Ok(Self::Error(
                    error.as_str().map_or_else(|| error.to_string(), str::to_string),
                )),
                None => Err(malformed("object frame without error")),
            },
            Value::Array(items) => {
                let mut items = items.into_iter();
                let channel = items
                    .next()
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| malformed("frame without channel"))?;
                let second = items.next();
                let third = items.next();
                match (channel, second, third) {
                    (HEARTBEAT_CHANNEL, None, _) => Ok(Self::Heartbeat),
                    (channel, Some(_), None) => Ok(Self::Ack { channel }),
                    (channel, Some(sequence), Some(Value::Array(entries))) => {
                        let sequence = sequence
                            .as_u64()
                            .ok_or_else(|| malformed("book frame without sequence"))?;
                        let entries = entries
                            .into_iter()
                            .map(BookEntry::parse)
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(Self::Book {
                            channel,
                            sequence,
                            entries,
                        })
                    }
                    _ => Err(malformed("unrecognized array frame")),
                }
            }
            _ => Err(malformed("unrecognized frame")),
        }
    }
}

/// Split order entries into a book update. Trades and unknown entries are
/// skipped; callers report the unknown ones.
#[must_use]
pub fn orders_to_update(entries: &[BookEntry]) -> BookUpdate {
    let mut update = BookUpdate::default();
    for entry in entries {
        if let BookEntry::Order(side, event) = entry {
            match side {
                Side::Ask => update.asks.push(*event),
                Side::Bid => update.bids.push(*event),
            }
        }
    }
    update
}
