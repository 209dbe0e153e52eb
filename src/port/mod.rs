//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! - [`ExchangeAdapter`] - Streaming connection to one exchange, driven by
//!   the connection lifecycle
//! - [`SnapshotSource`] - One-shot order book snapshot fetch (REST)

mod exchange;
mod snapshot;

pub use exchange::{AdapterEvent, ExchangeAdapter};
pub use snapshot::SnapshotSource;
