//! Binance streaming adapter.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use super::message::{BinanceMessage, ControlResponse, StreamEnvelope, SubscribeRequest};
use super::settings::BinanceSettings;
use crate::adapter::sequence::{SequenceCheck, SequenceTracker};
use crate::adapter::transport::{Inbound, WsTransport};
use crate::domain::MarketName;
use crate::error::{Error, Result};
use crate::port::{AdapterEvent, ExchangeAdapter, SnapshotSource};

const EXCHANGE: &str = "binance";

/// Binance order book adapter.
///
/// `subscribe` sends a live `SUBSCRIBE` frame and then fetches the REST
/// snapshot; stream frames queue in the socket meanwhile and are checked
/// against the snapshot's `lastUpdateId` once read.
pub struct BinanceAdapter {
    transport: WsTransport,
    snapshots: Arc<dyn SnapshotSource>,
    /// Lowercase stream symbol to standard market name.
    symbols: HashMap<String, MarketName>,
    sequences: SequenceTracker,
    pending: VecDeque<AdapterEvent>,
    request_id: u64,
    /// `SUBSCRIBE` requests awaiting their response.
    requests: HashMap<u64, MarketName>,
}

impl BinanceAdapter {
    pub fn new(settings: &BinanceSettings, snapshots: Arc<dyn SnapshotSource>) -> Self {
        Self {
            transport: WsTransport::new(settings.ws_url.clone()),
            snapshots,
            symbols: HashMap::new(),
            sequences: SequenceTracker::new(),
            pending: VecDeque::new(),
            request_id: 0,
            requests: HashMap::new(),
        }
    }

    /// Native symbol for a standard market name, e.g. `ETH/BTC` -> `ETHBTC`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMarket`] if the name is not `ASSET/CURRENCY`.
    pub fn native_symbol(market: &MarketName) -> Result<String> {
        let market = MarketName::parse(market.as_str()).map_err(|_| Error::UnknownMarket {
            exchange: EXCHANGE,
            market: market.to_string(),
        })?;
        Ok(format!("{}{}", market.asset(), market.currency()).to_uppercase())
    }

    fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<BinanceMessage>(text) {
            Ok(BinanceMessage::Stream(envelope)) => self.handle_depth(&envelope),
            Ok(BinanceMessage::Response(response)) => self.handle_response(response),
            Ok(BinanceMessage::Unknown(value)) => {
                debug!(exchange = EXCHANGE, message = %value, "Ignoring unknown message");
            }
            Err(e) => warn!(exchange = EXCHANGE, error = %e, bytes = text.len(), "Failed to parse message"),
        }
    }

    fn handle_response(&mut self, response: ControlResponse) {
        let market = self.requests.remove(&response.id);
        let Some(error) = response.error else {
            debug!(exchange = EXCHANGE, id = response.id, "Control request acknowledged");
            return;
        };

        warn!(
            exchange = EXCHANGE,
            id = response.id,
            code = error.code,
            msg = %error.msg,
            "Control request rejected"
        );
        if let Some(market) = market {
            self.sequences.remove(&market);
            self.pending.push_back(AdapterEvent::SubscriptionFailed {
                market,
                reason: format!("code {}: {}", error.code, error.msg),
            });
        }
    }

    fn handle_depth(&mut self, envelope: &StreamEnvelope) {
        let Some(market) = self.symbols.get(envelope.symbol()).cloned() else {
            trace!(exchange = EXCHANGE, stream = %envelope.stream, "Update for unknown stream");
            return;
        };

        let data = &envelope.data;
        let update = match data.to_book_update() {
            Ok(update) => update,
            Err(e) => {
                // Cursor is not advanced, so the next update reports a gap
                warn!(exchange = EXCHANGE, market = %market, error = %e, "Dropping malformed update");
                return;
            }
        };

        match self
            .sequences
            .check(&market, data.first_update_id, data.final_update_id)
        {
            SequenceCheck::Apply => self.pending.push_back(AdapterEvent::Delta { market, update }),
            SequenceCheck::Stale => {
                trace!(
                    exchange = EXCHANGE,
                    market = %market,
                    final_update_id = data.final_update_id,
                    "Dropping update already in snapshot"
                );
            }
            SequenceCheck::Gap { expected, received } => {
                self.sequences.remove(&market);
                self.pending.push_back(AdapterEvent::Gap {
                    market,
                    expected,
                    received,
                });
            }
            SequenceCheck::NoSnapshot => {
                debug!(exchange = EXCHANGE, market = %market, "Update before snapshot");
            }
        }
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    async fn open(&mut self) -> Result<()> {
        self.sequences.clear();
        self.pending.clear();
        self.requests.clear();
        self.transport.connect().await
    }

    async fn close(&mut self) {
        self.transport.close().await;
        self.sequences.clear();
        self.pending.clear();
    }

    async fn subscribe(&mut self, market: &MarketName) -> Result<()> {
        let symbol = Self::native_symbol(market)?;
        let stream = format!("{}@depth", symbol.to_lowercase());

        self.request_id += 1;
        info!(exchange = EXCHANGE, market = %market, stream = %stream, "Subscribing to depth stream");
        self.transport
            .send_json(&SubscribeRequest::new(vec![stream], self.request_id))
            .await?;
        self.requests.insert(self.request_id, market.clone());
        self.symbols.insert(symbol.to_lowercase(), market.clone());

        let snapshot = self.snapshots.fetch_snapshot(&symbol).await?;
        let Some(sequence) = snapshot.sequence else {
            return Err(Error::Snapshot {
                market: market.to_string(),
                reason: "snapshot has no lastUpdateId".into(),
            });
        };

        debug!(exchange = EXCHANGE, market = %market, last_update_id = sequence, "Got initial state");
        self.sequences.reset(market.clone(), sequence);
        self.pending.push_back(AdapterEvent::Initial {
            market: market.clone(),
            snapshot,
        });
        Ok(())
    }

    async fn next_event(&mut self) -> Option<AdapterEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            match self.transport.recv().await {
                Inbound::Text(text) => self.handle_text(&text),
                Inbound::Closed(reason) => return Some(AdapterEvent::Disconnected { reason }),
            }
        }
    }

    fn exchange_name(&self) -> &'static str {
        EXCHANGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderEventKind, Snapshot};
    use crate::testkit::domain::{market, snapshot};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubSnapshots {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SnapshotSource for StubSnapshots {
        async fn fetch_snapshot(&self, _symbol: &str) -> Result<Snapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(snapshot(&[("2", "1")], &[("1", "1")]).with_sequence(100))
        }
    }

    fn adapter() -> (BinanceAdapter, Arc<StubSnapshots>) {
        let stub = Arc::new(StubSnapshots {
            calls: AtomicU32::new(0),
        });
        let mut adapter = BinanceAdapter::new(&BinanceSettings::default(), stub.clone());
        adapter.symbols.insert("ethbtc".into(), market("ETH/BTC"));
        adapter.sequences.reset(market("ETH/BTC"), 100);
        (adapter, stub)
    }

    fn depth(first: u64, last: u64) -> String {
        format!(
            r#"{{"stream":"ethbtc@depth","data":{{"e":"depthUpdate","E":1,"s":"ETHBTC","U":{first},"u":{last},"b":[["0.0024","10"]],"a":[["0.0026","0"]]}}}}"#
        )
    }

    #[test]
    fn native_symbol_concatenates_uppercase() {
        assert_eq!(
            BinanceAdapter::native_symbol(&market("eth/btc")).unwrap(),
            "ETHBTC"
        );
        assert!(matches!(
            BinanceAdapter::native_symbol(&market("ETHBTC")),
            Err(Error::UnknownMarket { .. })
        ));
    }

    #[test]
    fn in_sequence_update_becomes_delta() {
        let (mut adapter, _) = adapter();
        adapter.handle_text(&depth(95, 105));

        let Some(AdapterEvent::Delta { market: name, update }) = adapter.pending.pop_front() else {
            panic!("expected delta");
        };
        assert_eq!(name, market("ETH/BTC"));
        assert_eq!(update.bids[0].kind, OrderEventKind::Update);
        assert_eq!(update.asks[0].kind, OrderEventKind::Delete);
    }

    #[test]
    fn update_covered_by_snapshot_is_dropped() {
        let (mut adapter, _) = adapter();
        adapter.handle_text(&depth(90, 99));
        assert!(adapter.pending.is_empty());
    }

    #[test]
    fn non_contiguous_update_reports_gap_and_is_discarded() {
        let (mut adapter, _) = adapter();
        adapter.handle_text(&depth(101, 103));
        adapter.handle_text(&depth(105, 106));

        assert!(matches!(
            adapter.pending.pop_front(),
            Some(AdapterEvent::Delta { .. })
        ));
        assert_eq!(
            adapter.pending.pop_front(),
            Some(AdapterEvent::Gap {
                market: market("ETH/BTC"),
                expected: 104,
                received: 105,
            })
        );
        assert!(adapter.pending.is_empty());
    }

    #[test]
    fn unknown_stream_is_ignored() {
        let (mut adapter, _) = adapter();
        adapter.handle_text(&depth(101, 101).replace("ethbtc", "ltcbtc"));
        adapter.handle_text("not json");
        adapter.handle_text(r#"{"result":null,"id":1}"#);
        assert!(adapter.pending.is_empty());
    }

    #[test]
    fn rejected_subscribe_fails_only_that_market() {
        let (mut adapter, _) = adapter();
        adapter.requests.insert(7, market("ETH/BTC"));
        adapter.requests.insert(8, market("LTC/BTC"));

        adapter.handle_text(r#"{"id":7,"error":{"code":2,"msg":"Invalid request"}}"#);
        adapter.handle_text(r#"{"result":null,"id":8}"#);

        assert_eq!(
            adapter.pending.pop_front(),
            Some(AdapterEvent::SubscriptionFailed {
                market: market("ETH/BTC"),
                reason: "code 2: Invalid request".into(),
            })
        );
        assert!(adapter.pending.is_empty());
        assert!(adapter.requests.is_empty());
        assert_eq!(adapter.sequences.last(&market("ETH/BTC")), None);

        // Updates stay out until a fresh snapshot
        adapter.handle_text(&depth(101, 101));
        assert!(adapter.pending.is_empty());
    }

    #[tokio::test]
    async fn subscribe_requires_open_transport() {
        let (mut adapter, stub) = adapter();
        let err = adapter.subscribe(&market("LTC/BTC")).await.unwrap_err();

        assert!(matches!(err, Error::Connection(_)));
        assert!(err.is_retryable());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn closed_transport_reports_disconnect() {
        let (mut adapter, _) = adapter();
        assert!(matches!(
            adapter.next_event().await,
            Some(AdapterEvent::Disconnected { .. })
        ));
    }
}
