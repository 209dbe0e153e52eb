//! Poloniex streaming adapter.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, trace, warn};

use super::message::{self, BookEntry, PoloniexFrame};
use super::settings::PoloniexSettings;
use crate::adapter::sequence::{SequenceCheck, SequenceTracker};
use crate::adapter::transport::{Inbound, WsTransport};
use crate::domain::MarketName;
use crate::error::{Error, Result};
use crate::port::{AdapterEvent, ExchangeAdapter};

const EXCHANGE: &str = "poloniex";

/// Poloniex order book adapter.
///
/// Each book frame carries a per-channel sequence number that increments by
/// one; the initial state frame sets the starting point.
pub struct PoloniexAdapter {
    transport: WsTransport,
    heartbeat_timeout: Duration,
    by_market: HashMap<MarketName, u64>,
    by_channel: HashMap<u64, MarketName>,
    sequences: SequenceTracker,
}

impl PoloniexAdapter {
    /// Build the adapter from its settings.
    ///
    /// Pairs in the channel table that are not `CURRENCY_ASSET` are skipped;
    /// [`PoloniexSettings::validate`] rejects them up front.
    #[must_use]
    pub fn new(settings: &PoloniexSettings) -> Self {
        let mut by_market = HashMap::new();
        let mut by_channel = HashMap::new();
        for (pair, &channel) in &settings.channels {
            match message::to_standard(pair) {
                Ok(market) => {
                    by_market.insert(market.clone(), channel);
                    by_channel.insert(channel, market);
                }
                Err(e) => warn!(exchange = EXCHANGE, pair = %pair, error = %e, "Skipping channel"),
            }
        }

        Self {
            transport: WsTransport::new(settings.ws_url.clone()),
            heartbeat_timeout: Duration::from_millis(settings.heartbeat_timeout_ms),
            by_market,
            by_channel,
            sequences: SequenceTracker::new(),
        }
    }

    /// Channel id for a market.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMarket`] if the market has no channel.
    pub fn channel(&self, market: &MarketName) -> Result<u64> {
        let unknown = || Error::UnknownMarket {
            exchange: EXCHANGE,
            market: market.to_string(),
        };
        let native = message::to_native(market).map_err(|_| unknown())?;
        let standard = message::to_standard(&native).map_err(|_| unknown())?;
        self.by_market.get(&standard).copied().ok_or_else(unknown)
    }

    fn handle_text(&mut self, text: &str) -> AdapterEvent {
        match PoloniexFrame::parse(text) {
            Ok(PoloniexFrame::Heartbeat) => AdapterEvent::Heartbeat,
            Ok(PoloniexFrame::Ack { channel }) => {
                debug!(exchange = EXCHANGE, channel, "Subscription acknowledged");
                AdapterEvent::Heartbeat
            }
            Ok(PoloniexFrame::Error(error)) => {
                warn!(exchange = EXCHANGE, error = %error, "Exchange reported an error");
                AdapterEvent::Heartbeat
            }
            Ok(PoloniexFrame::Book {
                channel,
                sequence,
                entries,
            }) => self.handle_book(channel, sequence, entries),
            Err(e) => {
                // Sequence is not advanced; the next book frame reports the gap
                warn!(exchange = EXCHANGE, error = %e, bytes = text.len(), "Failed to parse message");
                AdapterEvent::Heartbeat
            }
        }
    }

    fn handle_book(&mut self, channel: u64, sequence: u64, entries: Vec<BookEntry>) -> AdapterEvent {
        let Some(market) = self.by_channel.get(&channel).cloned() else {
            warn!(exchange = EXCHANGE, channel, "Data for unknown channel");
            return AdapterEvent::Heartbeat;
        };

        let initial = entries.iter().find_map(|entry| match entry {
            BookEntry::Initial { snapshot, .. } => Some(snapshot.clone()),
            _ => None,
        });
        if let Some(snapshot) = initial {
            debug!(exchange = EXCHANGE, market = %market, sequence, "Got initial state");
            self.sequences.reset(market.clone(), sequence);
            return AdapterEvent::Initial {
                market,
                snapshot: snapshot.with_sequence(sequence),
            };
        }

        match self.sequences.check(&market, sequence, sequence) {
            SequenceCheck::Apply => {
                for entry in &entries {
                    if let BookEntry::Unknown(e) = entry {
                        warn!(
                            exchange = EXCHANGE,
                            market = %market,
                            sequence,
                            error = %e,
                            "Skipping book entry"
                        );
                    }
                }
                let update = message::orders_to_update(&entries);
                if update.is_empty() {
                    AdapterEvent::Heartbeat
                } else {
                    AdapterEvent::Delta { market, update }
                }
            }
            SequenceCheck::Stale => {
                trace!(exchange = EXCHANGE, market = %market, sequence, "Dropping stale update");
                AdapterEvent::Heartbeat
            }
            SequenceCheck::Gap { expected, received } => {
                self.sequences.remove(&market);
                AdapterEvent::Gap {
                    market,
                    expected,
                    received,
                }
            }
            SequenceCheck::NoSnapshot => {
                debug!(exchange = EXCHANGE, market = %market, "Update before initial state");
                AdapterEvent::Heartbeat
            }
        }
    }
}

#[async_trait]
impl ExchangeAdapter for PoloniexAdapter {
    async fn open(&mut self) -> Result<()> {
        self.sequences.clear();
        self.transport.connect().await
    }

    async fn close(&mut self) {
        self.transport.close().await;
        self.sequences.clear();
    }

    async fn subscribe(&mut self, market: &MarketName) -> Result<()> {
        let channel = self.channel(market)?;
        info!(exchange = EXCHANGE, market = %market, channel, "Subscribing to market");
        self.call("subscribe", json!({ "channel": channel })).await?;
        Ok(())
    }

    async fn call(&mut self, method: &str, args: Value) -> Result<Value> {
        let frame = message::command(method, args)?;
        self.transport.send_json(&frame).await?;
        Ok(Value::Null)
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
