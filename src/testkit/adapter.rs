//! Mock [`ExchangeAdapter`] implementations for testing.
//!
//! - [`ScriptedAdapter`] - Pre-loaded open/subscribe results and events.
//!   Best for: reconnection, backoff timing, heartbeat and refresh behavior.
//!
//! - [`ChannelAdapter`] - Channel-backed adapter with external control handle.
//!   Best for: streamer tests needing on-demand event delivery.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::domain::MarketName;
use crate::error::{Error, Result};
use crate::port::{AdapterEvent, ExchangeAdapter};

/// Shared call counters and records for a mock adapter.
#[derive(Debug, Clone, Default)]
pub struct AdapterRecorder {
    opens: Arc<AtomicU32>,
    closes: Arc<AtomicU32>,
    open_times: Arc<Mutex<Vec<Instant>>>,
    subscriptions: Arc<Mutex<Vec<MarketName>>>,
}

impl AdapterRecorder {
    /// How many times `open()` was called.
    pub fn open_count(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    /// How many times `close()` was called.
    pub fn close_count(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    /// Clock reading at each `open()` call, in call order.
    pub fn open_times(&self) -> Vec<Instant> {
        self.open_times.lock().clone()
    }

    /// Every market passed to `subscribe()`, in call order.
    pub fn subscriptions(&self) -> Vec<MarketName> {
        self.subscriptions.lock().clone()
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    fn record_open(&self) {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.open_times.lock().push(Instant::now());
    }

    fn record_close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn record_subscribe(&self, market: &MarketName) {
        self.subscriptions.lock().push(market.clone());
    }
}

// ---------------------------------------------------------------------------
// ScriptedAdapter
// ---------------------------------------------------------------------------

/// A mock adapter with scripted open/subscribe results and a fixed event queue.
///
/// Each call to `open()` or `subscribe()` pops the next result from the
/// corresponding queue (defaults to `Ok(())` when exhausted). Once the event
/// queue is drained the connection goes silent.
pub struct ScriptedAdapter {
    open_results: VecDeque<Result<()>>,
    subscribe_results: VecDeque<Result<()>>,
    events: VecDeque<AdapterEvent>,
    heartbeat: Option<Duration>,
    stalled_opens: u32,
    unavailable: Vec<MarketName>,
    recorder: AdapterRecorder,
    is_open: bool,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self {
            open_results: VecDeque::new(),
            subscribe_results: VecDeque::new(),
            events: VecDeque::new(),
            heartbeat: None,
            stalled_opens: 0,
            unavailable: Vec::new(),
            recorder: AdapterRecorder::default(),
            is_open: false,
        }
    }

    pub fn with_open_results(mut self, results: Vec<Result<()>>) -> Self {
        self.open_results = results.into();
        self
    }

    pub fn with_subscribe_results(mut self, results: Vec<Result<()>>) -> Self {
        self.subscribe_results = results.into();
        self
    }

    pub fn with_events(mut self, events: Vec<AdapterEvent>) -> Self {
        self.events = events.into();
        self
    }

    pub fn with_heartbeat(mut self, timeout: Duration) -> Self {
        self.heartbeat = Some(timeout);
        self
    }

    /// The first `count` calls to `open()` never complete.
    pub fn with_stalled_opens(mut self, count: u32) -> Self {
        self.stalled_opens = count;
        self
    }

    /// Every `subscribe()` for `market` fails with [`Error::Snapshot`].
    pub fn with_unavailable_market(mut self, market: &str) -> Self {
        self.unavailable.push(MarketName::from(market));
        self
    }

    /// Get shared counters for asserting calls after the adapter is moved.
    pub fn recorder(&self) -> AdapterRecorder {
        self.recorder.clone()
    }
}

impl Default for ScriptedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for ScriptedAdapter {
    async fn open(&mut self) -> Result<()> {
        self.recorder.record_open();
        if self.stalled_opens > 0 {
            self.stalled_opens -= 1;
            std::future::pending::<()>().await;
        }
        let result = self.open_results.pop_front().unwrap_or(Ok(()));
        self.is_open = result.is_ok();
        result
    }

    async fn close(&mut self) {
        self.recorder.record_close();
        self.is_open = false;
    }

    async fn subscribe(&mut self, market: &MarketName) -> Result<()> {
        self.recorder.record_subscribe(market);
        if self.unavailable.contains(market) {
            return Err(Error::Snapshot {
                market: market.to_string(),
                reason: "unavailable".into(),
            });
        }
        self.subscribe_results.pop_front().unwrap_or(Ok(()))
    }

    async fn next_event(&mut self) -> Option<AdapterEvent> {
        if !self.is_open {
            return None;
        }
        match self.events.pop_front() {
            Some(event) => Some(event),
            // Connection stays alive but silent
            None => std::future::pending().await,
        }
    }

    fn heartbeat_timeout(&self) -> Option<Duration> {
        self.heartbeat
    }

    fn exchange_name(&self) -> &'static str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// ChannelAdapter
// ---------------------------------------------------------------------------

/// A mock adapter controlled externally via a [`ChannelAdapterHandle`].
///
/// Events are sent into the handle and read by the lifecycle via
/// `next_event()`. No real network I/O.
pub struct ChannelAdapter {
    event_rx: mpsc::Receiver<AdapterEvent>,
    heartbeat: Option<Duration>,
    recorder: AdapterRecorder,
}

impl ChannelAdapter {
    pub fn with_heartbeat(mut self, timeout: Duration) -> Self {
        self.heartbeat = Some(timeout);
        self
    }
}

/// Control handle for a [`ChannelAdapter`].
#[derive(Clone)]
pub struct ChannelAdapterHandle {
    event_tx: mpsc::Sender<AdapterEvent>,
    recorder: AdapterRecorder,
}

impl ChannelAdapterHandle {
    /// Send an event to the adapter.
    pub async fn send(&self, event: AdapterEvent) {
        let _ = self.event_tx.send(event).await;
    }

    pub fn recorder(&self) -> &AdapterRecorder {
        &self.recorder
    }
}

/// Create a [`ChannelAdapter`] and its control [`ChannelAdapterHandle`].
pub fn channel_adapter(buffer: usize) -> (ChannelAdapter, ChannelAdapterHandle) {
    let (tx, rx) = mpsc::channel(buffer);
    let recorder = AdapterRecorder::default();
    (
        ChannelAdapter {
            event_rx: rx,
            heartbeat: None,
            recorder: recorder.clone(),
        },
        ChannelAdapterHandle {
            event_tx: tx,
            recorder,
        },
    )
}

#[async_trait]
impl ExchangeAdapter for ChannelAdapter {
    async fn open(&mut self) -> Result<()> {
        self.recorder.record_open();
        Ok(())
    }

    async fn close(&mut self) {
        self.recorder.record_close();
    }

    async fn subscribe(&mut self, market: &MarketName) -> Result<()> {
        self.recorder.record_subscribe(market);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<AdapterEvent> {
        match self.event_rx.recv().await {
            Some(event) => Some(event),
            None => std::future::pending().await,
        }
    }

    fn heartbeat_timeout(&self) -> Option<Duration> {
        self.heartbeat
    }

    fn exchange_name(&self) -> &'static str {
        "mock"
    }
}
