//! Exchange-agnostic order book domain.
//!
//! - [`id`] - Market name newtype
//! - [`money`] - Decimal rate/quantity aliases and the removal epsilon
//! - [`book`] - Records, events, snapshots and update batches
//! - [`side`] - Single-side price level store
//! - [`market`] - Two-sided book for one symbol with change notifications

pub mod book;
pub mod id;
pub mod market;
pub mod money;
pub mod side;

pub use book::{BookUpdate, OrderBookRecord, OrderEvent, OrderEventKind, Snapshot};
pub use id::MarketName;
pub use market::{Market, MarketUpdate};
pub use money::{Quantity, Rate, EPSILON};
pub use side::{OrderBookSide, Side};
