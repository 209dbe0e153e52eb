//! Per-exchange streamer: owns the markets and routes book events to them.
//!
//! A [`Streamer`] runs two tasks:
//!
//! - the [`ConnectionLifecycle`] driving the exchange adapter
//! - a dispatch loop applying [`StreamEvent`]s to the registered markets
//!
//! Markets are created on demand by [`Streamer::market`] and live for the
//! lifetime of the streamer.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::domain::{Market, MarketName};
use crate::error::{Error, Result};
use crate::lifecycle::{ConnectionLifecycle, ConnectionState, LifecycleConfig, LifecycleHandle, StreamEvent};
use crate::port::ExchangeAdapter;

/// Sizing and timing for a [`Streamer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamerConfig {
    pub lifecycle: LifecycleConfig,
    /// Buffer between the lifecycle and the dispatch loop.
    pub event_capacity: usize,
    /// Per-market notification buffer.
    pub notification_capacity: usize,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleConfig::default(),
            event_capacity: 1024,
            notification_capacity: 256,
        }
    }
}

type Markets = Arc<DashMap<MarketName, Arc<Market>>>;

/// Order book streamer for one exchange.
pub struct Streamer {
    exchange: &'static str,
    markets: Markets,
    handle: LifecycleHandle,
    notification_capacity: usize,
    lifecycle: Option<JoinHandle<Result<()>>>,
    dispatch: JoinHandle<()>,
}

impl Streamer {
    /// Start streaming from `adapter`. Must be called within a tokio runtime.
    pub fn spawn<A: ExchangeAdapter + 'static>(adapter: A, config: StreamerConfig) -> Self {
        let exchange = adapter.exchange_name();
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        let (handle, lifecycle) = ConnectionLifecycle::spawn(adapter, config.lifecycle, events_tx);

        let markets: Markets = Arc::new(DashMap::new());
        let dispatch = tokio::spawn(dispatch(exchange, Arc::clone(&markets), events_rx));

        info!(exchange, "Streamer started");
        Self {
            exchange,
            markets,
            handle,
            notification_capacity: config.notification_capacity,
            lifecycle: Some(lifecycle),
            dispatch,
        }
    }

    #[must_use]
    pub fn exchange_name(&self) -> &'static str {
        self.exchange
    }

    /// Get the market for `name`, creating and subscribing it on first use.
    ///
    /// Names are upper-cased, so `eth/btc` and `ETH/BTC` are the same market.
    /// The subscription is sent once the connection is ready; the returned
    /// market stays empty until its first snapshot arrives.
    pub fn market(&self, name: impl Into<MarketName>) -> Arc<Market> {
        let name = normalize(name.into());
        match self.markets.entry(name.clone()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let market = Arc::new(Market::new(name.clone(), self.notification_capacity));
                entry.insert(Arc::clone(&market));
                debug!(exchange = self.exchange, market = %name, "Market registered");

                let handle = self.handle.clone();
                let exchange = self.exchange;
                tokio::spawn(async move {
                    if let Err(e) = handle.ready().await {
                        warn!(exchange, market = %name, error = %e, "Not subscribing, connection unavailable");
                        return;
                    }
                    if let Err(e) = handle.subscribe(name.clone()).await {
                        warn!(exchange, market = %name, error = %e, "Failed to request subscription");
                    }
                });
                market
            }
        }
    }

    #[must_use]
    pub fn has_market(&self, name: &MarketName) -> bool {
        self.markets.contains_key(&normalize(name.clone()))
    }

    /// Every registered market, sorted by name.
    #[must_use]
    pub fn markets(&self) -> Vec<Arc<Market>> {
        let mut markets: Vec<_> = self.markets.iter().map(|m| Arc::clone(m.value())).collect();
        markets.sort_by(|a, b| a.name().cmp(b.name()));
        markets
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.handle.state_changes()
    }

    /// Wait until the connection is established.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] if the connection stopped for good.
    pub async fn ready(&self) -> Result<()> {
        self.handle.ready().await
    }

    /// Issue a protocol command on the live connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] for exchanges without command frames,
    /// [`Error::NotReady`] while disconnected.
    pub async fn call(&self, method: &str, args: Value) -> Result<Value> {
        self.handle.call(method, args).await
    }

    /// Wait for the connection task to finish on its own.
    ///
    /// Resolves only after a fatal error or an external shutdown request.
    /// Cancel-safe: if the returned future is dropped, the task is still
    /// awaited by [`shutdown`](Self::shutdown).
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the connection.
    pub async fn closed(&mut self) -> Result<()> {
        let Some(task) = self.lifecycle.as_mut() else {
            return Ok(());
        };
        let result = join(task).await;
        self.lifecycle = None;
        result
    }

    /// Stop the connection and wait for both tasks to finish.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the connection, if it had already
    /// failed.
    pub async fn shutdown(mut self) -> Result<()> {
        info!(exchange = self.exchange, "Shutting down streamer");
        self.handle.shutdown().await;
        let result = self.closed().await;
        // Dispatch ends once the lifecycle drops its event sender
        if let Err(e) = self.dispatch.await {
            warn!(exchange = self.exchange, error = %e, "Dispatch task failed");
        }
        result
    }
}

fn normalize(name: MarketName) -> MarketName {
    if name.as_str().chars().any(char::is_lowercase) {
        MarketName::new(name.as_str().to_uppercase())
    } else {
        name
    }
}

async fn join(task: &mut JoinHandle<Result<()>>) -> Result<()> {
    task.await
        .map_err(|e| Error::Connection(format!("lifecycle task failed: {e}")))?
}

fn lookup(markets: &Markets, name: &MarketName) -> Option<Arc<Market>> {
    markets.get(name).map(|m| Arc::clone(m.value()))
}

async fn dispatch(exchange: &'static str, markets: Markets, mut events: mpsc::Receiver<StreamEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            StreamEvent::Initial { market, snapshot } => match lookup(&markets, &market) {
                Some(target) => {
                    debug!(
                        exchange,
                        market = %market,
                        asks = snapshot.asks.len(),
                        bids = snapshot.bids.len(),
                        "Applying snapshot"
                    );
                    target.apply_snapshot(snapshot);
                }
                None => trace!(exchange, market = %market, "Snapshot for unregistered market"),
            },
            StreamEvent::Delta { market, update } => match lookup(&markets, &market) {
                Some(target) => target.apply_update(&update),
                None => trace!(exchange, market = %market, "Update for unregistered market"),
            },
            StreamEvent::ConnectionOpened => debug!(exchange, "Connection opened"),
            StreamEvent::ConnectionReset => {
                debug!(exchange, markets = markets.len(), "Connection reset, clearing books");
                for market in markets.iter() {
                    market.value().clear();
                }
            }
        }
    }
    debug!(exchange, "Dispatch loop stopped");
}
