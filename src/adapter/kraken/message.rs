//! Kraken wire types.
//!
//! Control traffic is JSON objects tagged by `event`. Book data arrives as
//! arrays:
//! ```json
//! [336, {"as": [["5541.3", "2.507", "1534614248.123678"]], "bs": [...]}, "book-10", "XBT/USD"]
//! [336, {"a": [["5541.3", "0.000", "1534614335.345903"]]}, {"b": [...]}, "book-10", "XBT/USD"]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::level::{self, WireLevel};
use crate::domain::{BookUpdate, MarketName, Snapshot};
use crate::error::DataError;

/// Kraken spells some assets differently from everyone else.
const ASSET_ALIASES: &[(&str, &str)] = &[("XBT", "BTC")];

/// Translate a Kraken pair such as `XBT/USD` to a standard market name.
#[must_use]
pub fn to_standard(pair: &str) -> MarketName {
    let standard = |asset: &str| {
        ASSET_ALIASES
            .iter()
            .find(|(native, _)| *native == asset)
            .map_or(asset.to_string(), |(_, standard)| (*standard).to_string())
    };
    match pair.split_once('/') {
        Some((asset, currency)) => MarketName::from_parts(&standard(asset), &standard(currency)),
        None => MarketName::new(pair),
    }
}

/// Translate a standard market name to the Kraken pair.
///
/// # Errors
///
/// Returns [`DataError::InvalidMarketName`] if the name is not `ASSET/CURRENCY`.
pub fn to_native(market: &MarketName) -> Result<String, DataError> {
    let market = MarketName::parse(&market.as_str().to_uppercase())?;
    let native = |asset: &str| {
        ASSET_ALIASES
            .iter()
            .find(|(_, standard)| *standard == asset)
            .map_or(asset.to_string(), |(native, _)| (*native).to_string())
    };
    Ok(format!(
        "{}/{}",
        native(market.asset()),
        native(market.currency())
    ))
}

#[derive(Debug, Serialize)]
pub struct SubscribeRequest {
    pub event: &'static str,
    pub pair: Vec<String>,
    pub subscription: Subscription,
}

#[derive(Debug, Serialize)]
pub struct Subscription {
    pub name: &'static str,
    pub depth: u32,
}

impl SubscribeRequest {
    pub fn book(pair: String, depth: u32) -> Self {
        Self {
            event: "subscribe",
            pair: vec![pair],
            subscription: Subscription { name: "book", depth },
        }
    }
}

/// Anything received on the socket.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum KrakenMessage {
    Event(KrakenEvent),
    Data(Vec<Value>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum KrakenEvent {
    Heartbeat,
    SystemStatus {
        status: String,
    },
    SubscriptionStatus {
        #[serde(rename = "channelID", default)]
        channel_id: Option<u64>,
        #[serde(default)]
        pair: Option<String>,
        status: String,
        #[serde(rename = "errorMessage", default)]
        error_message: Option<String>,
    },
    #[serde(other)]
    Other,
}

/// One object inside a book data array.
#[derive(Debug, Default, Deserialize)]
pub struct BookPayload {
    #[serde(rename = "as", default)]
    pub snapshot_asks: Option<Vec<WireLevel>>,
    #[serde(rename = "bs", default)]
    pub snapshot_bids: Option<Vec<WireLevel>>,
    #[serde(rename = "a", default)]
    pub asks: Option<Vec<WireLevel>>,
    #[serde(rename = "b", default)]
    pub bids: Option<Vec<WireLevel>>,
}

/// Book content of a data frame.
#[derive(Debug, Clone, PartialEq)]
pub enum BookContent {
    Snapshot(Snapshot),
    Update(BookUpdate),
}

/// A decoded book data array.
#[derive(Debug, Default)]
pub struct BookFrame {
    pub channel_id: u64,
    /// Native pair, present on current protocol versions.
    pub pair: Option<String>,
    pub payloads: Vec<BookPayload>,
}

impl BookFrame {
    /// Decode `[channelID, payload..., channelName?, pair?]`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Malformed`] if the channel id or a payload is
    /// missing or not understood.
    pub fn parse(values: Vec<Value>) -> Result<Self, DataError> {
        let mut values = values.into_iter();
        let channel_id = values
            .next()
            .and_then(|v| v.as_u64())
            .ok_or_else(|| DataError::Malformed("book frame without channel id".into()))?;

        let mut frame = Self {
            channel_id,
            ..Self::default()
        };
        let mut names = Vec::new();
        for value in values {
            match value {
                Value::Object(_) => frame.payloads.push(
                    serde_json::from_value(value).map_err(|e| DataError::Malformed(e.to_string()))?,
                ),
                Value::String(name) => names.push(name),
                _ => {}
            }
        }
        if frame.payloads.is_empty() {
            return Err(DataError::Malformed("book frame without payload".into()));
        }
        // Trailing strings are the channel name and then the pair
        if names.len() >= 2 {
            frame.pair = names.pop();
        }
        Ok(frame)
    }

    /// Interpret the payloads as a snapshot or an update.
    ///
    /// Returns `None` when no payload carries book levels.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidDecimal`] for malformed numbers.
    pub fn content(&self) -> Result<Option<BookContent>, DataError> {
        if let Some(payload) = self
            .payloads
            .iter()
            .find(|p| p.snapshot_asks.is_some() || p.snapshot_bids.is_some())
        {
            let asks = payload.snapshot_asks.as_deref().unwrap_or_default();
            let bids = payload.snapshot_bids.as_deref().unwrap_or_default();
            return Ok(Some(BookContent::Snapshot(Snapshot::new(
                level::records(asks)?,
                level::records(bids)?,
            ))));
        }

        let mut update = BookUpdate::default();
        let mut seen = false;
        for payload in &self.payloads {
            if let Some(asks) = &payload.asks {
                update.asks.extend(level::level_events(asks)?);
                seen = true;
            }
            if let Some(bids) = &payload.bids {
                update.bids.extend(level::level_events(bids)?);
                seen = true;
            }
        }
        Ok(seen.then_some(BookContent::Update(update)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderEventKind;
    use rust_decimal_macros::dec;

    fn frame(json: &str) -> BookFrame {
        let KrakenMessage::Data(values) = serde_json::from_str(json).unwrap() else {
            panic!("expected data frame");
        };
        BookFrame::parse(values).unwrap()
    }

    #[test]
    fn pair_translation_handles_xbt() {
        assert_eq!(to_standard("XBT/USD"), MarketName::new("BTC/USD"));
        assert_eq!(to_standard("ETH/XBT"), MarketName::new("ETH/BTC"));
        assert_eq!(to_native(&MarketName::new("btc/eur")).unwrap(), "XBT/EUR");
        assert!(to_native(&MarketName::new("BTCEUR")).is_err());
    }

    #[test]
    fn subscribe_request_serializes_correctly() {
        let json = serde_json::to_string(&SubscribeRequest::book("XBT/USD".into(), 10)).unwrap();
        assert_eq!(
            json,
            r#"{"event":"subscribe","pair":["XBT/USD"],"subscription":{"name":"book","depth":10}}"#
        );
    }

    #[test]
    fn parses_control_events() {
        let message: KrakenMessage = serde_json::from_str(r#"{"event":"heartbeat"}"#).unwrap();
        assert!(matches!(message, KrakenMessage::Event(KrakenEvent::Heartbeat)));

        let message: KrakenMessage = serde_json::from_str(
            r#"{"channelID":10001,"event":"subscriptionStatus","pair":"XBT/EUR","status":"subscribed","subscription":{"name":"book"}}"#,
        )
        .unwrap();
        assert!(matches!(
            message,
            KrakenMessage::Event(KrakenEvent::SubscriptionStatus {
                channel_id: Some(10001),
                ..
            })
        ));

        let message: KrakenMessage = serde_json::from_str(r#"{"event":"pong","reqid":4}"#).unwrap();
        assert!(matches!(message, KrakenMessage::Event(KrakenEvent::Other)));
    }

    #[test]
    fn snapshot_frame_becomes_snapshot() {
        let frame = frame(
            r#"[336,{"as":[["5541.30000","2.50700000","1534614248.123678"]],"bs":[["5541.20000","1.52900000","1534614248.765567"]]},"book-10","XBT/USD"]"#,
        );
        assert_eq!(frame.channel_id, 336);
        assert_eq!(frame.pair.as_deref(), Some("XBT/USD"));

        let Some(BookContent::Snapshot(snapshot)) = frame.content().unwrap() else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.asks[0].rate, dec!(5541.3));
        assert_eq!(snapshot.bids[0].quantity, dec!(1.529));
    }

    #[test]
    fn split_update_frame_merges_sides() {
        let frame = frame(
            r#"[1234,{"a":[["5541.30000","0.00000000","1534614335.345903"]]},{"b":[["5541.30000","0.00000000","1534614335.345903","r"]],"c":"974942666"},"book-10","XBT/USD"]"#,
        );
        let Some(BookContent::Update(update)) = frame.content().unwrap() else {
            panic!("expected update");
        };
        assert_eq!(update.asks.len(), 1);
        assert_eq!(update.bids.len(), 1);
        assert_eq!(update.asks[0].kind, OrderEventKind::Delete);
    }

    #[test]
    fn legacy_frame_has_no_pair() {
        let frame = frame(r#"[7,{"b":[["1.5","2","1534614335.1"]]}]"#);
        assert_eq!(frame.pair, None);
        let Some(BookContent::Update(update)) = frame.content().unwrap() else {
            panic!("expected update");
        };
        assert_eq!(update.bids[0].kind, OrderEventKind::Update);
    }

    #[test]
    fn frame_without_payload_is_malformed() {
        assert!(BookFrame::parse(vec![Value::from(1), Value::from("book-10")]).is_err());
        assert!(BookFrame::parse(vec![Value::from("x")]).is_err());
    }

    #[test]
    fn payload_without_levels_has_no_content() {
        let frame = frame(r#"[7,{"c":"123"}]"#);
        assert_eq!(frame.content().unwrap(), None);
    }
}
