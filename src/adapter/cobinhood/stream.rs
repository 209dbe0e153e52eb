//! Cobinhood streaming adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use super::message::{self, CobinhoodMessage, FrameKind, SubscribeRequest};
use super::settings::CobinhoodSettings;
use crate::adapter::transport::{Inbound, WsTransport};
use crate::domain::MarketName;
use crate::error::{Error, Result};
use crate::port::{AdapterEvent, ExchangeAdapter};

const EXCHANGE: &str = "cobinhood";

pub struct CobinhoodAdapter {
    transport: WsTransport,
    precision: String,
    pairs: HashMap<String, MarketName>,
}

impl CobinhoodAdapter {
    #[must_use]
    pub fn new(settings: &CobinhoodSettings) -> Self {
        Self {
            transport: WsTransport::new(settings.ws_url.clone()),
            precision: settings.precision.clone(),
            pairs: HashMap::new(),
        }
    }

    fn market_for_pair(&self, pair: &str) -> MarketName {
        self.pairs
            .get(pair)
            .cloned()
            .unwrap_or_else(|| message::to_standard(pair))
    }

    fn handle_text(&self, text: &str) -> AdapterEvent {
        let message = match serde_json::from_str::<CobinhoodMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(exchange = EXCHANGE, error = %e, bytes = text.len(), "Failed to parse message");
                return AdapterEvent::Heartbeat;
            }
        };

        match message.kind() {
            FrameKind::Snapshot { pair } => {
                let market = self.market_for_pair(&pair);
                match message.to_snapshot() {
                    Ok(snapshot) => AdapterEvent::Initial { market, snapshot },
                    Err(e) => {
                        warn!(exchange = EXCHANGE, market = %market, error = %e, "Dropping malformed snapshot");
                        AdapterEvent::Heartbeat
                    }
                }
            }
            FrameKind::Update { pair } => {
                let market = self.market_for_pair(&pair);
                match message.to_update() {
                    Ok(update) => AdapterEvent::Delta { market, update },
                    Err(e) => {
                        warn!(exchange = EXCHANGE, market = %market, error = %e, "Dropping malformed update");
                        AdapterEvent::Heartbeat
                    }
                }
            }
            FrameKind::Subscribed => {
                debug!(exchange = EXCHANGE, pair = ?message.pair(), "Subscribed");
                AdapterEvent::Heartbeat
            }
            FrameKind::Pong => {
                trace!(exchange = EXCHANGE, "Pong");
                AdapterEvent::Heartbeat
            }
            FrameKind::Error(error) => {
                warn!(exchange = EXCHANGE, error = %error, "Exchange reported an error");
                AdapterEvent::Heartbeat
            }
            FrameKind::Other(kind) => {
                trace!(exchange = EXCHANGE, kind = %kind, "Ignoring frame");
                AdapterEvent::Heartbeat
            }
        }
    }
}

#[async_trait]
impl ExchangeAdapter for CobinhoodAdapter {
    async fn open(&mut self) -> Result<()> {
        self.transport.connect().await
    }

    async fn close(&mut self) {
        self.transport.close().await;
    }

    async fn subscribe(&mut self, market: &MarketName) -> Result<()> {
        let pair = message::to_native(market).map_err(|_| Error::UnknownMarket {
            exchange: EXCHANGE,
            market: market.to_string(),
        })?;

        info!(exchange = EXCHANGE, market = %market, pair = %pair, "Subscribing to order book");
        self.transport
            .send_json(&SubscribeRequest::order_book(
                pair.clone(),
                self.precision.clone(),
            ))
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

    fn exchange_name(&self) -> &'static str {
        EXCHANGE
    }
}
