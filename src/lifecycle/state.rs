//! Connection states, commands and outbound stream events.

use std::fmt;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::domain::{BookUpdate, MarketName, Snapshot};
use crate::error::Result;

/// Lifecycle state of one exchange connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

/// Events forwarded from the lifecycle to the streamer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Initial {
        market: MarketName,
        snapshot: Snapshot,
    },
    Delta {
        market: MarketName,
        update: BookUpdate,
    },
    /// Transport established and every subscription re-issued.
    ConnectionOpened,
    /// Transport torn down; every book is stale.
    ConnectionReset,
}

/// Requests sent to a running lifecycle.
#[derive(Debug)]
pub enum Command {
    Subscribe(MarketName),
    Call {
        method: String,
        args: Value,
        reply: oneshot::Sender<Result<Value>>,
    },
    Shutdown,
}
