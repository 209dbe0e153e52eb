//! Binance wire types.
//!
//! Combined stream frames wrap the payload with its stream name:
//! ```json
//! {"stream":"ethbtc@depth","data":{"e":"depthUpdate","E":1,"s":"ETHBTC","U":157,"u":160,"b":[["0.0024","10"]],"a":[["0.0026","100"]]}}
//! ```
//! Control requests are acknowledged with `{"result":null,"id":1}`.

use serde::{Deserialize, Serialize};

use crate::adapter::level::{self, WireLevel};
use crate::domain::{BookUpdate, Snapshot};
use crate::error::DataError;

/// Live `SUBSCRIBE` control request.
#[derive(Debug, Serialize)]
pub struct SubscribeRequest {
    pub method: &'static str,
    pub params: Vec<String>,
    pub id: u64,
}

impl SubscribeRequest {
    pub fn new(streams: Vec<String>, id: u64) -> Self {
        Self {
            method: "SUBSCRIBE",
            params: streams,
            id,
        }
    }
}

/// Messages received on the combined stream.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BinanceMessage {
    Stream(StreamEnvelope),
    Response(ControlResponse),
    /// Unknown or unparseable message.
    Unknown(serde_json::Value),
}

#[derive(Debug, Deserialize)]
pub struct StreamEnvelope {
    pub stream: String,
    pub data: DepthUpdate,
}

impl StreamEnvelope {
    /// Lowercase symbol the stream belongs to, e.g. `ethbtc`.
    #[must_use]
    pub fn symbol(&self) -> &str {
        self.stream
            .split_once('@')
            .map_or(self.stream.as_str(), |(symbol, _)| symbol)
    }
}

#[derive(Debug, Deserialize)]
pub struct ControlResponse {
    pub id: u64,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<ControlError>,
}

#[derive(Debug, Deserialize)]
pub struct ControlError {
    pub code: i64,
    pub msg: String,
}

/// Incremental depth update.
#[derive(Debug, Deserialize)]
pub struct DepthUpdate {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "U")]
    pub first_update_id: u64,
    #[serde(rename = "u")]
    pub final_update_id: u64,
    #[serde(rename = "b", default)]
    pub bids: Vec<WireLevel>,
    #[serde(rename = "a", default)]
    pub asks: Vec<WireLevel>,
}

impl DepthUpdate {
    /// Convert to a batch of absolute level updates.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidDecimal`] for malformed numbers.
    pub fn to_book_update(&self) -> Result<BookUpdate, DataError> {
        Ok(BookUpdate::new(
            level::level_events(&self.asks)?,
            level::level_events(&self.bids)?,
        ))
    }
}

/// REST depth snapshot.
#[derive(Debug, Deserialize)]
pub struct DepthSnapshot {
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,
    pub bids: Vec<WireLevel>,
    pub asks: Vec<WireLevel>,
}

impl DepthSnapshot {
    /// Convert to a domain snapshot carrying `lastUpdateId` as its sequence.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidDecimal`] for malformed numbers.
    pub fn to_snapshot(&self) -> Result<Snapshot, DataError> {
        Ok(
            Snapshot::new(level::records(&self.asks)?, level::records(&self.bids)?)
                .with_sequence(self.last_update_id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderEventKind;
    use rust_decimal_macros::dec;

    #[test]
    fn subscribe_request_serializes_correctly() {
        let request = SubscribeRequest::new(vec!["ethbtc@depth".into()], 3);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"method":"SUBSCRIBE","params":["ethbtc@depth"],"id":3}"#
        );
    }

    #[test]
    fn parses_depth_stream_frame() {
        let json = r#"{"stream":"ethbtc@depth","data":{"e":"depthUpdate","E":123456789,"s":"ETHBTC","U":157,"u":160,"b":[["0.0024","10"]],"a":[["0.0026","100"],["0.0027","0.00000000"]]}}"#;
        let BinanceMessage::Stream(envelope) = serde_json::from_str(json).unwrap() else {
            panic!("expected stream frame");
        };

        assert_eq!(envelope.symbol(), "ethbtc");
        assert_eq!(envelope.data.first_update_id, 157);
        assert_eq!(envelope.data.final_update_id, 160);

        let update = envelope.data.to_book_update().unwrap();
        assert_eq!(update.bids[0].rate, dec!(0.0024));
        assert_eq!(update.bids[0].kind, OrderEventKind::Update);
        assert_eq!(update.asks[1].kind, OrderEventKind::Delete);
    }

    #[test]
    fn parses_control_response() {
        let message: BinanceMessage = serde_json::from_str(r#"{"result":null,"id":1}"#).unwrap();
        assert!(matches!(message, BinanceMessage::Response(ControlResponse { id: 1, .. })));
    }

    #[test]
    fn parses_rest_snapshot() {
        let json = r#"{"lastUpdateId":1027024,"bids":[["4.00000000","431.00000000",[]]],"asks":[["4.00000200","12.00000000",[]]]}"#;
        let snapshot: DepthSnapshot = serde_json::from_str(json).unwrap();
        let snapshot = snapshot.to_snapshot().unwrap();

        assert_eq!(snapshot.sequence, Some(1027024));
        assert_eq!(snapshot.bids[0].quantity, dec!(431));
        assert_eq!(snapshot.asks[0].rate, dec!(4.000002));
    }
}
