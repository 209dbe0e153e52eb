//! Exchange port for streaming order book data.
//!
//! This module defines the trait every exchange adapter implements. The
//! connection lifecycle owns one adapter and drives it through
//! open → subscribe → read events → close.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{BookUpdate, MarketName, Snapshot};
use crate::error::{Error, Result};

/// Normalized event produced by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    /// Full book state for a market; replaces anything held before.
    Initial {
        market: MarketName,
        snapshot: Snapshot,
    },
    /// Batch of changes to apply on top of the last snapshot.
    Delta {
        market: MarketName,
        update: BookUpdate,
    },
    /// An update did not follow the last applied sequence number.
    ///
    /// The offending batch has already been discarded. The book is no longer
    /// trustworthy until a fresh snapshot arrives.
    Gap {
        market: MarketName,
        expected: u64,
        received: u64,
    },
    /// The exchange refused a subscription after `subscribe` returned.
    ///
    /// The market's book stops receiving updates until it is subscribed again.
    SubscriptionFailed {
        market: MarketName,
        reason: String,
    },
    /// Liveness signal with no book data.
    Heartbeat,
    /// Transport lost.
    Disconnected {
        reason: String,
    },
}

impl AdapterEvent {
    /// Market this event concerns, if any.
    #[must_use]
    pub fn market(&self) -> Option<&MarketName> {
        match self {
            Self::Initial { market, .. }
            | Self::Delta { market, .. }
            | Self::Gap { market, .. }
            | Self::SubscriptionFailed { market, .. } => Some(market),
            Self::Heartbeat | Self::Disconnected { .. } => None,
        }
    }
}

/// Streaming connection to one exchange.
///
/// Implementations translate standard `ASSET/CURRENCY` market names to their
/// native symbols, parse wire messages into [`AdapterEvent`]s and check
/// sequence numbers where the exchange provides them.
#[async_trait]
pub trait ExchangeAdapter: Send {
    /// Open the transport.
    ///
    /// Any per-connection state (channel maps, sequence cursors) is reset.
    async fn open(&mut self) -> Result<()>;

    /// Close the transport. Idempotent.
    async fn close(&mut self);

    /// Request order book data for a market.
    ///
    /// Only called while the transport is open. Adapters that fetch snapshots
    /// out of band do so here, so a failure fails the subscription.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMarket`] when the market cannot be mapped to a
    /// native symbol, or a transport error.
    async fn subscribe(&mut self, market: &MarketName) -> Result<()>;

    /// Issue a protocol-level command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] unless the exchange protocol is
    /// command-style.
    async fn call(&mut self, method: &str, args: Value) -> Result<Value> {
        let _ = (method, args);
        Err(Error::Unsupported {
            exchange: self.exchange_name(),
            operation: "call",
        })
    }

    /// Receive the next event.
    ///
    /// Must be cancel-safe: the lifecycle polls it inside `select!`.
    /// Returns `None` once the transport is closed.
    async fn next_event(&mut self) -> Option<AdapterEvent>;

    /// Maximum silence before the connection counts as dead.
    fn heartbeat_timeout(&self) -> Option<Duration> {
        None
    }

    /// Get the exchange name for logging/debugging.
    fn exchange_name(&self) -> &'static str;
}

/// Implement ExchangeAdapter for boxed trait objects to allow use with generic wrappers.
#[async_trait]
impl ExchangeAdapter for Box<dyn ExchangeAdapter> {
    async fn open(&mut self) -> Result<()> {
        (**self).open().await
    }

    async fn close(&mut self) {
        (**self).close().await;
    }

    async fn subscribe(&mut self, market: &MarketName) -> Result<()> {
        (**self).subscribe(market).await
    }

    async fn call(&mut self, method: &str, args: Value) -> Result<Value> {
        (**self).call(method, args).await
    }

    async fn next_event(&mut self) -> Option<AdapterEvent> {
        (**self).next_event().await
    }

    fn heartbeat_timeout(&self) -> Option<Duration> {
        (**self).heartbeat_timeout()
    }

    fn exchange_name(&self) -> &'static str {
        (**self).exchange_name()
    }
}
