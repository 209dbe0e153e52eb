//! Kraken streaming adapter.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use super::message::{self, BookContent, BookFrame, KrakenEvent, KrakenMessage, SubscribeRequest};
use super::settings::KrakenSettings;
use crate::adapter::transport::{Inbound, WsTransport};
use crate::domain::MarketName;
use crate::error::{Error, Result};
use crate::port::{AdapterEvent, ExchangeAdapter};

const EXCHANGE: &str = "kraken";

/// Kraken order book adapter.
///
/// Every frame, data or control, counts as a sign of life. Kraken sends a
/// `heartbeat` event about once a second when no data is flowing.
pub struct KrakenAdapter {
    transport: WsTransport,
    depth: u32,
    heartbeat_timeout: Duration,
    /// Native pair to the market name it was requested as.
    pairs: HashMap<String, MarketName>,
    /// Channel ids assigned on this connection.
    channels: HashMap<u64, MarketName>,
}

impl KrakenAdapter {
    #[must_use]
    pub fn new(settings: &KrakenSettings) -> Self {
        Self {
            transport: WsTransport::new(settings.ws_url.clone()),
            depth: settings.depth,
            heartbeat_timeout: Duration::from_millis(settings.heartbeat_timeout_ms),
            pairs: HashMap::new(),
            channels: HashMap::new(),
        }
    }

    fn market_for_pair(&self, pair: &str) -> MarketName {
        self.pairs
            .get(pair)
            .cloned()
            .unwrap_or_else(|| message::to_standard(pair))
    }

    fn handle_text(&mut self, text: &str) -> AdapterEvent {
        match serde_json::from_str::<KrakenMessage>(text) {
            Ok(KrakenMessage::Event(event)) => self.handle_event(event),
            Ok(KrakenMessage::Data(values)) => self.handle_data(values),
            Err(e) => {
                warn!(exchange = EXCHANGE, error = %e, bytes = text.len(), "Failed to parse message");
                AdapterEvent::Heartbeat
            }
        }
    }

    fn handle_event(&mut self, event: KrakenEvent) -> AdapterEvent {
        match event {
            KrakenEvent::Heartbeat => trace!(exchange = EXCHANGE, "Heartbeat"),
            KrakenEvent::SystemStatus { status } => {
                if status == "online" {
                    debug!(exchange = EXCHANGE, status = %status, "System status");
                } else {
                    warn!(exchange = EXCHANGE, status = %status, "Exchange is not online");
                }
            }
            KrakenEvent::SubscriptionStatus {
                channel_id,
                pair,
                status,
                error_message,
            } => match (status.as_str(), channel_id, pair) {
                ("subscribed", Some(channel_id), Some(pair)) => {
                    let market = self.market_for_pair(&pair);
                    debug!(exchange = EXCHANGE, market = %market, channel_id, "Subscribed");
                    self.channels.insert(channel_id, market);
                }
                ("error", _, pair) => {
                    let reason = error_message.unwrap_or_else(|| "unknown".into());
                    warn!(exchange = EXCHANGE, pair = ?pair, error = %reason, "Subscription rejected");
                    if let Some(market) = pair.and_then(|pair| self.pairs.get(&pair).cloned()) {
                        return AdapterEvent::SubscriptionFailed { market, reason };
                    }
                }
                (status, _, pair) => {
                    debug!(exchange = EXCHANGE, status, pair = ?pair, "Subscription status");
                }
            },
            KrakenEvent::Other => trace!(exchange = EXCHANGE, "Ignoring event"),
        }
        AdapterEvent::Heartbeat
    }

    fn handle_data(&mut self, values: Vec<Value>) -> AdapterEvent {
        let frame = match BookFrame::parse(values) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(exchange = EXCHANGE, error = %e, "Unrecognized data frame");
                return AdapterEvent::Heartbeat;
            }
        };

        let market = match (self.channels.get(&frame.channel_id), &frame.pair) {
            (Some(market), _) => market.clone(),
            (None, Some(pair)) => self.market_for_pair(pair),
            (None, None) => {
                trace!(exchange = EXCHANGE, channel_id = frame.channel_id, "Data for unknown channel");
                return AdapterEvent::Heartbeat;
            }
        };

        match frame.content() {
            Ok(Some(BookContent::Snapshot(snapshot))) => AdapterEvent::Initial { market, snapshot },
            Ok(Some(BookContent::Update(update))) => AdapterEvent::Delta { market, update },
            Ok(None) => {
                warn!(exchange = EXCHANGE, market = %market, "Unrecognized book payload");
                AdapterEvent::Heartbeat
            }
            Err(e) => {
                warn!(exchange = EXCHANGE, market = %market, error = %e, "Dropping malformed update");
                AdapterEvent::Heartbeat
            }
        }
    }
}

#[async_trait]
impl ExchangeAdapter for KrakenAdapter {
    async fn open(&mut self) -> Result<()> {
        self.channels.clear();
        self.transport.connect().await
    }

    async fn close(&mut self) {
        self.transport.close().await;
        self.channels.clear();
    }

    async fn subscribe(&mut self, market: &MarketName) -> Result<()> {
        let pair = message::to_native(market).map_err(|_| Error::UnknownMarket {
            exchange: EXCHANGE,
            market: market.to_string(),
        })?;

        info!(exchange = EXCHANGE, market = %market, pair = %pair, "Subscribing to book");
        self.transport
            .send_json(&SubscribeRequest::book(pair.clone(), self.depth))
            .await?;
        self.pairs.insert(pair, market.clone());
        Ok(())
    }

    async fn next_event(&mut self) -> Option<AdapterEvent> {
        match self.transport.recv().await {
            Inbound::Text(text) => Some(self.handle_text(&text)),
            Inbound::Closed(reason) => Some(AdapterEvent::Disconnected { reason }),
        }
    }

    fn heartbeat_timeout(&self) -> Option<Duration> {
        Some(self.heartbeat_timeout)
    }

    fn exchange_name(&self) -> &'static str {
        EXCHANGE
    }
}
