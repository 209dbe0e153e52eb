//! Connection state machine driving one exchange adapter.
//!
//! [`ConnectionLifecycle`] owns the adapter and runs it in a single task:
//!
//! 1. Open the transport and re-issue every known subscription
//! 2. Forward book events while connected
//! 3. On transport error, heartbeat timeout or sequence gap: tear down and
//!    reconnect after an exponential backoff delay
//! 4. Every refresh interval: tear down and reconnect immediately
//!
//! A market whose subscription fails for its own reasons (snapshot fetch,
//! refused request) is retried on a separate backoff while the connection
//! and every other market stay up.
//!
//! Other tasks talk to it through a cloneable [`LifecycleHandle`].

use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

use super::backoff::Backoff;
use super::readiness::Readiness;
use super::state::{Command, ConnectionState, StreamEvent};
use crate::domain::MarketName;
use crate::error::{Error, Result};
use crate::port::{AdapterEvent, ExchangeAdapter};

const COMMAND_BUFFER: usize = 64;

/// Timing parameters for a [`ConnectionLifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// First reconnect delay; doubles per consecutive failure.
    pub base_delay: Duration,
    /// Forced reconnect interval regardless of connection health.
    pub refresh_interval: Duration,
    /// Limit on [`ExchangeAdapter::open`]; expiry counts as a failed attempt.
    pub connect_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            refresh_interval: Duration::from_secs(30 * 60),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Why the connected phase ended.
#[derive(Debug)]
enum Exit {
    Shutdown,
    Refresh,
    Failed(String),
}

/// Result of one subscribe attempt.
#[derive(Debug)]
enum Outcome {
    Subscribed,
    /// The exchange will never serve this market.
    Rejected,
    /// This market failed; retry it later on the same connection.
    Deferred,
    /// The connection is unusable.
    Broken(Error),
}

/// Cloneable handle to a running [`ConnectionLifecycle`].
#[derive(Debug, Clone)]
pub struct LifecycleHandle {
    commands: mpsc::Sender<Command>,
    readiness: Readiness,
    state: watch::Receiver<ConnectionState>,
}

impl LifecycleHandle {
    /// Wait until the connection is established.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] if the lifecycle stopped on a fatal error
    /// or was shut down.
    pub async fn ready(&self) -> Result<()> {
        self.readiness.wait().await
    }

    /// Ask the lifecycle to subscribe to a market.
    ///
    /// The subscription is remembered and re-issued on every reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the lifecycle has stopped.
    pub async fn subscribe(&self, market: MarketName) -> Result<()> {
        self.commands
            .send(Command::Subscribe(market))
            .await
            .map_err(|_| Error::ChannelClosed("lifecycle commands"))
    }

    /// Issue a protocol command on the live connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] while disconnected, the adapter's error
    /// otherwise.
    pub async fn call(&self, method: &str, args: Value) -> Result<Value> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Call {
                method: method.to_string(),
                args,
                reply,
            })
            .await
            .map_err(|_| Error::ChannelClosed("lifecycle commands"))?;
        rx.await
            .map_err(|_| Error::ChannelClosed("lifecycle call reply"))?
    }

    /// Request a graceful stop. Returns once the request is queued.
    pub async fn shutdown(&self) {
        // Already stopped is fine
        let _ = self.commands.send(Command::Shutdown).await;
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}

/// State machine owning one adapter.
pub struct ConnectionLifecycle<A: ExchangeAdapter> {
    adapter: A,
    config: LifecycleConfig,
    backoff: Backoff,
    subscriptions: Vec<MarketName>,
    /// Subscribed markets still waiting for a successful attempt.
    retry: Vec<MarketName>,
    retry_backoff: Backoff,
    readiness: Readiness,
    state: watch::Sender<ConnectionState>,
    events: mpsc::Sender<StreamEvent>,
    commands: mpsc::Receiver<Command>,
}

impl<A: ExchangeAdapter + 'static> ConnectionLifecycle<A> {
    /// Create a lifecycle and the handle used to drive it.
    ///
    /// Nothing happens until [`run`](Self::run) is awaited.
    pub fn new(
        adapter: A,
        config: LifecycleConfig,
        events: mpsc::Sender<StreamEvent>,
    ) -> (Self, LifecycleHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let readiness = Readiness::new();

        let lifecycle = Self {
            adapter,
            config,
            backoff: Backoff::new(config.base_delay),
            subscriptions: Vec::new(),
            retry: Vec::new(),
            retry_backoff: Backoff::new(config.base_delay),
            readiness: readiness.clone(),
            state: state_tx,
            events,
            commands: command_rx,
        };
        let handle = LifecycleHandle {
            commands: command_tx,
            readiness,
            state: state_rx,
        };
        (lifecycle, handle)
    }

    /// Create a lifecycle and run it on a new task.
    pub fn spawn(
        adapter: A,
        config: LifecycleConfig,
        events: mpsc::Sender<StreamEvent>,
    ) -> (LifecycleHandle, JoinHandle<Result<()>>) {
        let (lifecycle, handle) = Self::new(adapter, config, events);
        (handle, tokio::spawn(lifecycle.run()))
    }

    /// Run until shutdown or a fatal error.
    ///
    /// # Errors
    ///
    /// Returns the adapter's error when opening fails with a non-retryable
    /// error (bad configuration or reference data).
    pub async fn run(mut self) -> Result<()> {
        let exchange = self.adapter.exchange_name();
        let mut delay = Duration::ZERO;

        loop {
            if !delay.is_zero() {
                info!(
                    exchange,
                    delay_ms = delay.as_millis() as u64,
                    attempt = self.backoff.consecutive_failures() + 1,
                    "Reconnecting after delay"
                );
                if !self.wait_out(delay).await {
                    self.stop("shutdown");
                    return Ok(());
                }
            }

            self.set_state(ConnectionState::Connecting);
            match self.connect().await {
                Ok(()) => {}
                Err(err) if !err.is_retryable() => {
                    error!(exchange, error = %err, "Connection failed permanently");
                    self.adapter.close().await;
                    self.stop(&err.to_string());
                    return Err(err);
                }
                Err(err) => {
                    warn!(exchange, error = %err, "Connection attempt failed");
                    self.adapter.close().await;
                    self.set_state(ConnectionState::Reconnecting);
                    delay = self.backoff.next_delay();
                    continue;
                }
            }

            self.set_state(ConnectionState::Connected);
            self.backoff.reset();
            self.readiness.set_connected();
            info!(
                exchange,
                subscriptions = self.subscriptions.len(),
                "Connected"
            );
            if self.events.send(StreamEvent::ConnectionOpened).await.is_err() {
                self.teardown().await;
                self.stop("event receiver dropped");
                return Ok(());
            }

            let exit = self.serve().await;
            self.teardown().await;

            match exit {
                Exit::Shutdown => {
                    info!(exchange, "Connection shut down");
                    self.stop("shutdown");
                    return Ok(());
                }
                Exit::Refresh => {
                    info!(exchange, "Refreshing connection");
                    delay = Duration::ZERO;
                }
                Exit::Failed(reason) => {
                    warn!(exchange, reason = %reason, "Connection lost, will reconnect");
                    self.set_state(ConnectionState::Reconnecting);
                    delay = self.backoff.next_delay();
                }
            }
        }
    }

    /// Open the transport and replay subscriptions.
    ///
    /// Only connection errors fail the attempt; markets that fail on their
    /// own are queued for retry.
    async fn connect(&mut self) -> Result<()> {
        match timeout(self.config.connect_timeout, self.adapter.open()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Connection(format!(
                    "connect timed out after {}ms",
                    self.config.connect_timeout.as_millis()
                )))
            }
        }

        self.retry.clear();
        let pending = std::mem::take(&mut self.subscriptions);
        let mut kept = Vec::with_capacity(pending.len());
        let mut pending = pending.into_iter();
        while let Some(market) = pending.next() {
            match self.try_subscribe(&market).await {
                Outcome::Subscribed => kept.push(market),
                Outcome::Rejected => {}
                Outcome::Deferred => {
                    self.retry.push(market.clone());
                    kept.push(market);
                }
                Outcome::Broken(err) => {
                    // Keep the remaining markets for the next attempt
                    kept.push(market);
                    kept.extend(pending);
                    self.subscriptions = kept;
                    return Err(err);
                }
            }
        }
        self.subscriptions = kept;
        Ok(())
    }

    async fn try_subscribe(&mut self, market: &MarketName) -> Outcome {
        let exchange = self.adapter.exchange_name();
        match self.adapter.subscribe(market).await {
            Ok(()) => Outcome::Subscribed,
            Err(err) if !err.is_retryable() => {
                warn!(exchange, market = %market, error = %err, "Subscription rejected");
                Outcome::Rejected
            }
            Err(err) if err.is_connection_error() => Outcome::Broken(err),
            Err(err) => {
                warn!(exchange, market = %market, error = %err, "Subscription failed, will retry");
                Outcome::Deferred
            }
        }
    }

    /// Deadline for the next retry round, `None` when nothing waits.
    fn next_retry(&mut self) -> Option<Instant> {
        if self.retry.is_empty() {
            return None;
        }
        let delay = self
            .retry_backoff
            .next_delay()
            .min(self.config.refresh_interval);
        Some(Instant::now() + delay)
    }

    /// Re-attempt every deferred market once.
    async fn retry_subscriptions(&mut self) -> Result<()> {
        let markets = std::mem::take(&mut self.retry);
        debug!(
            exchange = self.adapter.exchange_name(),
            markets = markets.len(),
            "Retrying subscriptions"
        );
        for market in markets {
            match self.try_subscribe(&market).await {
                Outcome::Subscribed => {
                    info!(exchange = self.adapter.exchange_name(), market = %market, "Subscribed");
                }
                Outcome::Rejected => self.subscriptions.retain(|m| m != &market),
                Outcome::Deferred => self.retry.push(market),
                // The next connect replays every subscription
                Outcome::Broken(err) => return Err(err),
            }
        }
        if self.retry.is_empty() {
            self.retry_backoff.reset();
        }
        Ok(())
    }

    /// Forward events until the connection has to be torn down.
    async fn serve(&mut self) -> Exit {
        let refresh_at = Instant::now() + self.config.refresh_interval;
        let heartbeat = self.adapter.heartbeat_timeout();
        let mut alive_until = heartbeat.map(|timeout| Instant::now() + timeout);
        let mut retry_at = self.next_retry();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => return Exit::Shutdown,
                    Some(Command::Subscribe(market)) => {
                        if let Err(reason) = self.subscribe(market).await {
                            return Exit::Failed(reason);
                        }
                        if retry_at.is_none() {
                            retry_at = self.next_retry();
                        }
                    }
                    Some(Command::Call { method, args, reply }) => {
                        let _ = reply.send(self.adapter.call(&method, args).await);
                    }
                },
                () = sleep_until(alive_until.unwrap_or(refresh_at)), if alive_until.is_some() => {
                    return Exit::Failed("heartbeat timeout".to_string());
                }
                () = sleep_until(refresh_at) => return Exit::Refresh,
                () = sleep_until(retry_at.unwrap_or(refresh_at)), if retry_at.is_some() => {
                    if let Err(err) = self.retry_subscriptions().await {
                        return Exit::Failed(err.to_string());
                    }
                    retry_at = self.next_retry();
                }
                event = self.adapter.next_event() => {
                    if let Some(timeout) = heartbeat {
                        alive_until = Some(Instant::now() + timeout);
                    }
                    let forward = match event {
                        Some(AdapterEvent::Initial { market, snapshot }) => {
                            StreamEvent::Initial { market, snapshot }
                        }
                        Some(AdapterEvent::Delta { market, update }) => {
                            StreamEvent::Delta { market, update }
                        }
                        Some(AdapterEvent::Heartbeat) => continue,
                        Some(AdapterEvent::Gap { market, expected, received }) => {
                            warn!(
                                exchange = self.adapter.exchange_name(),
                                market = %market,
                                expected,
                                received,
                                "Sequence gap, resynchronizing"
                            );
                            return Exit::Failed(format!("sequence gap on {market}"));
                        }
                        Some(AdapterEvent::SubscriptionFailed { market, reason }) => {
                            self.defer(market, &reason);
                            if retry_at.is_none() {
                                retry_at = self.next_retry();
                            }
                            continue;
                        }
                        Some(AdapterEvent::Disconnected { reason }) => return Exit::Failed(reason),
                        None => return Exit::Failed("stream ended".to_string()),
                    };
                    if self.events.send(forward).await.is_err() {
                        return Exit::Shutdown;
                    }
                }
            }
        }
    }

    /// Queue a market the exchange refused after accepting the request.
    fn defer(&mut self, market: MarketName, reason: &str) {
        let exchange = self.adapter.exchange_name();
        if !self.subscriptions.contains(&market) {
            debug!(exchange, market = %market, "Ignoring failure for unsubscribed market");
            return;
        }
        warn!(exchange, market = %market, reason, "Subscription failed, will retry");
        if !self.retry.contains(&market) {
            self.retry.push(market);
        }
    }

    /// Subscribe while connected. Only connection errors end the connection.
    async fn subscribe(&mut self, market: MarketName) -> std::result::Result<(), String> {
        let exchange = self.adapter.exchange_name();
        if self.subscriptions.contains(&market) {
            debug!(exchange, market = %market, "Already subscribed");
            return Ok(());
        }

        match self.try_subscribe(&market).await {
            Outcome::Subscribed => {
                info!(exchange, market = %market, "Subscribed");
                self.subscriptions.push(market);
                Ok(())
            }
            Outcome::Rejected => Ok(()),
            Outcome::Deferred => {
                self.retry.push(market.clone());
                self.subscriptions.push(market);
                Ok(())
            }
            Outcome::Broken(err) => {
                // Replayed by the next connect
                self.subscriptions.push(market);
                Err(err.to_string())
            }
        }
    }

    /// Wait out a reconnect delay while still taking commands.
    ///
    /// Returns `false` if shutdown was requested.
    async fn wait_out(&mut self, delay: Duration) -> bool {
        let timer = sleep(delay);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                () = &mut timer => return true,
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => return false,
                    Some(Command::Subscribe(market)) => {
                        if !self.subscriptions.contains(&market) {
                            debug!(market = %market, "Queued subscription until reconnect");
                            self.subscriptions.push(market);
                        }
                    }
                    Some(Command::Call { method, reply, .. }) => {
                        let _ = reply.send(Err(Error::NotReady(format!(
                            "cannot call {method} while disconnected"
                        ))));
                    }
                },
            }
        }
    }

    async fn teardown(&mut self) {
        self.readiness.set_disconnected();
        self.adapter.close().await;
        // Receiver may be gone during shutdown
        let _ = self.events.send(StreamEvent::ConnectionReset).await;
    }

    fn stop(&mut self, reason: &str) {
        self.set_state(ConnectionState::Disconnected);
        self.readiness.close(reason);
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(
                exchange = self.adapter.exchange_name(),
                from = %previous,
                to = %state,
                "Connection state changed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::adapter::{channel_adapter, ScriptedAdapter};
    use crate::testkit::domain::{
        delta_event, disconnect_event, gap_event, initial_event, market, snapshot,
        subscription_failed,
    };

    const HEARTBEAT: Duration = Duration::from_millis(1500);

    fn config() -> LifecycleConfig {
        LifecycleConfig::default()
    }

    fn events() -> (mpsc::Sender<StreamEvent>, mpsc::Receiver<StreamEvent>) {
        mpsc::channel(64)
    }

    fn elapsed_ms(times: &[Instant], from: usize, to: usize) -> u128 {
        (times[to] - times[from]).as_millis()
    }

    async fn next_book_event(rx: &mut mpsc::Receiver<StreamEvent>) -> StreamEvent {
        loop {
            match rx.recv().await.expect("event channel open") {
                StreamEvent::ConnectionOpened | StreamEvent::ConnectionReset => continue,
                event => return event,
            }
        }
    }

    // -----------------------------------------------------------------------
    // Connect and readiness
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn ready_resolves_after_open() {
        let adapter = ScriptedAdapter::new();
        let recorder = adapter.recorder();
        let (tx, mut rx) = events();
        let (handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);

        handle.ready().await.unwrap();

        assert_eq!(handle.state(), ConnectionState::Connected);
        assert_eq!(recorder.open_count(), 1);
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_open_failures_keep_waiters_queued() {
        let adapter = ScriptedAdapter::new().with_open_results(vec![
            Err(Error::Connection("refused".into())),
            Err(Error::Connection("refused".into())),
            Ok(()),
        ]);
        let recorder = adapter.recorder();
        let (tx, _rx) = events();
        let (handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);

        handle.ready().await.unwrap();

        let times = recorder.open_times();
        assert_eq!(times.len(), 3);
        assert_eq!(elapsed_ms(&times, 0, 1), 100);
        assert_eq!(elapsed_ms(&times, 1, 2), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_open_error_rejects_waiters_and_stops() {
        let adapter = ScriptedAdapter::new().with_open_results(vec![Err(Error::UnknownMarket {
            exchange: "mock",
            market: "DOGE/BTC".into(),
        })]);
        let (tx, _rx) = events();
        let (handle, task) = ConnectionLifecycle::spawn(adapter, config(), tx);

        let err = handle.ready().await.unwrap_err();
        assert!(matches!(err, Error::NotReady(_)));

        let result = task.await.unwrap();
        assert!(matches!(result, Err(Error::UnknownMarket { .. })));
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }

    // -----------------------------------------------------------------------
    // Heartbeat and backoff
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn heartbeat_expiry_reconnects_after_base_delay() {
        let adapter = ScriptedAdapter::new().with_heartbeat(HEARTBEAT);
        let recorder = adapter.recorder();
        let (tx, mut rx) = events();
        let (handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);
        handle.ready().await.unwrap();
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));

        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionReset));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));

        let times = recorder.open_times();
        assert_eq!(times.len(), 2);
        assert_eq!(elapsed_ms(&times, 0, 1), 1500 + 100);
        assert_eq!(recorder.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_failure_doubles_delay() {
        let adapter = ScriptedAdapter::new()
            .with_heartbeat(HEARTBEAT)
            .with_open_results(vec![Ok(()), Err(Error::Connection("refused".into())), Ok(())]);
        let recorder = adapter.recorder();
        let (tx, mut rx) = events();
        let (_handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);

        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionReset));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));

        let times = recorder.open_times();
        assert_eq!(times.len(), 3);
        assert_eq!(elapsed_ms(&times, 0, 1), 1500 + 100);
        assert_eq!(elapsed_ms(&times, 1, 2), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_resets_once_connected() {
        let adapter = ScriptedAdapter::new().with_heartbeat(HEARTBEAT);
        let recorder = adapter.recorder();
        let (tx, mut rx) = events();
        let (_handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);

        for _ in 0..3 {
            assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
            assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionReset));
        }

        let times = recorder.open_times();
        assert_eq!(elapsed_ms(&times, 0, 1), 1600);
        assert_eq!(elapsed_ms(&times, 1, 2), 1600);
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_events_keep_connection_alive() {
        let (adapter, control) = channel_adapter(16);
        let adapter = adapter.with_heartbeat(HEARTBEAT);
        let (tx, mut rx) = events();
        let (handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);
        handle.ready().await.unwrap();

        for _ in 0..5 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            control.send(AdapterEvent::Heartbeat).await;
        }

        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
        assert!(rx.try_recv().is_err());
        assert_eq!(control.recorder().open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_event_triggers_reconnect() {
        let adapter = ScriptedAdapter::new().with_events(vec![disconnect_event("reset by peer")]);
        let recorder = adapter.recorder();
        let (tx, mut rx) = events();
        let (_handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);

        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionReset));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));

        assert_eq!(elapsed_ms(&recorder.open_times(), 0, 1), 100);
    }

    // -----------------------------------------------------------------------
    // Refresh
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn refresh_reconnects_without_delay() {
        let adapter = ScriptedAdapter::new();
        let recorder = adapter.recorder();
        let (tx, mut rx) = events();
        let config = LifecycleConfig {
            refresh_interval: Duration::from_secs(60),
            ..LifecycleConfig::default()
        };
        let (_handle, _task) = ConnectionLifecycle::spawn(adapter, config, tx);

        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionReset));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));

        assert_eq!(elapsed_ms(&recorder.open_times(), 0, 1), 60_000);
    }

    #[test]
    fn default_refresh_is_thirty_minutes() {
        assert_eq!(
            LifecycleConfig::default().refresh_interval,
            Duration::from_secs(1800)
        );
        assert_eq!(
            LifecycleConfig::default().base_delay,
            Duration::from_millis(100)
        );
        assert_eq!(
            LifecycleConfig::default().connect_timeout,
            Duration::from_secs(10)
        );
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn subscriptions_replayed_after_reconnect() {
        let adapter = ScriptedAdapter::new().with_heartbeat(HEARTBEAT);
        let recorder = adapter.recorder();
        let (tx, mut rx) = events();
        let (handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);
        handle.ready().await.unwrap();

        handle.subscribe(market("ETH/BTC")).await.unwrap();
        handle.subscribe(market("LTC/BTC")).await.unwrap();
        handle.subscribe(market("ETH/BTC")).await.unwrap();

        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionReset));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));

        assert_eq!(
            recorder.subscriptions(),
            vec![
                market("ETH/BTC"),
                market("LTC/BTC"),
                market("ETH/BTC"),
                market("LTC/BTC"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_subscription_is_not_replayed() {
        let adapter = ScriptedAdapter::new()
            .with_heartbeat(HEARTBEAT)
            .with_subscribe_results(vec![Err(Error::UnknownMarket {
                exchange: "mock",
                market: "NOPE/BTC".into(),
            })]);
        let recorder = adapter.recorder();
        let (tx, mut rx) = events();
        let (handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);
        handle.ready().await.unwrap();

        handle.subscribe(market("NOPE/BTC")).await.unwrap();
        handle.subscribe(market("ETH/BTC")).await.unwrap();

        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionReset));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));

        assert_eq!(
            recorder.subscriptions(),
            vec![market("NOPE/BTC"), market("ETH/BTC"), market("ETH/BTC")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_snapshot_is_retried_on_the_same_connection() {
        let adapter = ScriptedAdapter::new().with_subscribe_results(vec![Err(Error::Snapshot {
            market: "ETH/BTC".into(),
            reason: "timeout".into(),
        })]);
        let recorder = adapter.recorder();
        let (tx, mut rx) = events();
        let (handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);
        handle.ready().await.unwrap();

        handle.subscribe(market("ETH/BTC")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(99)).await;
        assert_eq!(recorder.subscribe_count(), 1);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(recorder.subscribe_count(), 2);

        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
        assert!(rx.try_recv().is_err());
        assert_eq!(recorder.open_count(), 1);
        assert_eq!(handle.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_market_does_not_disturb_the_others() {
        let adapter = ScriptedAdapter::new().with_unavailable_market("FOO/BTC");
        let recorder = adapter.recorder();
        let (tx, mut rx) = events();
        let (handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);
        handle.ready().await.unwrap();

        handle.subscribe(market("ETH/BTC")).await.unwrap();
        handle.subscribe(market("FOO/BTC")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(handle.state(), ConnectionState::Connected);
        assert_eq!(recorder.open_count(), 1);
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
        assert!(rx.try_recv().is_err());

        let subscriptions = recorder.subscriptions();
        let eth = subscriptions.iter().filter(|m| **m == market("ETH/BTC")).count();
        let foo = subscriptions.iter().filter(|m| **m == market("FOO/BTC")).count();
        assert_eq!(eth, 1);
        assert!(foo > 5, "expected repeated retries, got {foo}");
    }

    #[tokio::test(start_paused = true)]
    async fn refused_subscription_is_retried_without_reconnecting() {
        let (adapter, control) = channel_adapter(16);
        let (tx, mut rx) = events();
        let (handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);
        handle.ready().await.unwrap();

        handle.subscribe(market("ETH/BTC")).await.unwrap();
        while control.recorder().subscribe_count() == 0 {
            tokio::task::yield_now().await;
        }

        control.send(subscription_failed("LTC/BTC", "not subscribed")).await;
        control.send(subscription_failed("ETH/BTC", "Invalid request")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(control.recorder().subscribe_count(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(control.recorder().subscriptions(), vec![market("ETH/BTC"), market("ETH/BTC")]);
        assert_eq!(control.recorder().open_count(), 1);
        assert_eq!(handle.state(), ConnectionState::Connected);
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_market_is_replayed_after_reconnect() {
        let adapter = ScriptedAdapter::new()
            .with_heartbeat(HEARTBEAT)
            .with_unavailable_market("FOO/BTC");
        let recorder = adapter.recorder();
        let (tx, mut rx) = events();
        let (handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);
        handle.ready().await.unwrap();

        handle.subscribe(market("FOO/BTC")).await.unwrap();
        handle.subscribe(market("ETH/BTC")).await.unwrap();

        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionReset));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));

        // Replay keeps going past the failing market
        let replayed: Vec<_> = recorder
            .subscriptions()
            .into_iter()
            .filter(|m| *m == market("ETH/BTC"))
            .collect();
        assert_eq!(replayed.len(), 2);
        assert_eq!(recorder.open_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn connection_error_on_subscribe_reconnects() {
        let adapter = ScriptedAdapter::new()
            .with_subscribe_results(vec![Err(Error::Connection("broken pipe".into()))]);
        let recorder = adapter.recorder();
        let (tx, mut rx) = events();
        let (handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);
        handle.ready().await.unwrap();

        handle.subscribe(market("ETH/BTC")).await.unwrap();

        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionReset));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));

        assert_eq!(recorder.subscribe_count(), 2);
        assert_eq!(elapsed_ms(&recorder.open_times(), 0, 1), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_open_times_out_and_backs_off() {
        let adapter = ScriptedAdapter::new().with_stalled_opens(1);
        let recorder = adapter.recorder();
        let (tx, _rx) = events();
        let (handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);

        handle.ready().await.unwrap();

        assert_eq!(recorder.open_count(), 2);
        assert_eq!(elapsed_ms(&recorder.open_times(), 0, 1), 10_000 + 100);
        assert_eq!(recorder.close_count(), 1);
    }

    // -----------------------------------------------------------------------
    // Event forwarding
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn book_events_are_forwarded_in_order() {
        let book = snapshot(&[("2", "1")], &[("1", "1")]);
        let adapter = ScriptedAdapter::new().with_events(vec![
            initial_event("ETH/BTC", book.clone()),
            AdapterEvent::Heartbeat,
            delta_event("ETH/BTC", vec![], vec![]),
        ]);
        let (tx, mut rx) = events();
        let (_handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);

        assert_eq!(
            next_book_event(&mut rx).await,
            StreamEvent::Initial {
                market: market("ETH/BTC"),
                snapshot: book,
            }
        );
        assert!(matches!(
            next_book_event(&mut rx).await,
            StreamEvent::Delta { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn gap_forces_resync() {
        let adapter = ScriptedAdapter::new().with_events(vec![
            gap_event("ETH/BTC", 11, 14),
            delta_event("ETH/BTC", vec![], vec![]),
        ]);
        let recorder = adapter.recorder();
        let (tx, mut rx) = events();
        let (_handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);

        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionReset));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
        assert!(matches!(rx.recv().await, Some(StreamEvent::Delta { .. })));
        assert_eq!(recorder.open_count(), 2);
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn call_is_unsupported_by_default() {
        let adapter = ScriptedAdapter::new();
        let (tx, _rx) = events();
        let (handle, _task) = ConnectionLifecycle::spawn(adapter, config(), tx);
        handle.ready().await.unwrap();

        let err = handle.call("ping", Value::Null).await.unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_tears_down_and_rejects_later_waiters() {
        let adapter = ScriptedAdapter::new();
        let recorder = adapter.recorder();
        let (tx, mut rx) = events();
        let (handle, task) = ConnectionLifecycle::spawn(adapter, config(), tx);
        handle.ready().await.unwrap();

        handle.shutdown().await;
        task.await.unwrap().unwrap();

        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionOpened));
        assert_eq!(rx.recv().await, Some(StreamEvent::ConnectionReset));
        assert_eq!(recorder.close_count(), 1);
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert!(matches!(handle.ready().await, Err(Error::NotReady(_))));
    }
}
