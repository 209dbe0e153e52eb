//! Order book records, events and batches.
//!
//! Adapters normalize every exchange payload into one of two shapes:
//!
//! - [`Snapshot`] - full state of both sides at one instant
//! - [`BookUpdate`] - a batch of [`OrderEvent`]s to apply on top of it
//!
//! # Examples
//!
//! ```
//! use bookfeed::domain::{BookUpdate, OrderEvent, OrderEventKind};
//! use rust_decimal_macros::dec;
//!
//! let update = BookUpdate::new(
//!     vec![OrderEvent::new(OrderEventKind::Update, dec!(101), dec!(2))],
//!     vec![OrderEvent::delete(dec!(99))],
//! );
//! assert_eq!(update.len(), 2);
//! ```

use serde::{Deserialize, Serialize};

use super::money::{Quantity, Rate};

/// One price level: the quantity resting at a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookRecord {
    pub rate: Rate,
    pub quantity: Quantity,
}

impl OrderBookRecord {
    #[must_use]
    pub const fn new(rate: Rate, quantity: Quantity) -> Self {
        Self { rate, quantity }
    }
}

/// How an [`OrderEvent`] mutates a side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderEventKind {
    /// Insert or replace the level.
    New,
    /// Remove the level if present.
    Delete,
    /// Insert or replace the level.
    Update,
    /// Add a signed quantity to the level.
    Delta,
}

/// A single mutation to apply to one side of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub kind: OrderEventKind,
    pub rate: Rate,
    pub quantity: Quantity,
}

impl OrderEvent {
    #[must_use]
    pub const fn new(kind: OrderEventKind, rate: Rate, quantity: Quantity) -> Self {
        Self {
            kind,
            rate,
            quantity,
        }
    }

    /// Absolute level update: zero quantity removes the level.
    ///
    /// Most exchanges publish the new total size per level and signal removal
    /// with a zero size.
    #[must_use]
    pub fn level(rate: Rate, quantity: Quantity) -> Self {
        if quantity.is_zero() {
            Self::delete(rate)
        } else {
            Self::new(OrderEventKind::Update, rate, quantity)
        }
    }

    #[must_use]
    pub fn delete(rate: Rate) -> Self {
        Self::new(OrderEventKind::Delete, rate, Quantity::ZERO)
    }

    #[must_use]
    pub const fn delta(rate: Rate, quantity: Quantity) -> Self {
        Self::new(OrderEventKind::Delta, rate, quantity)
    }
}

impl From<OrderBookRecord> for OrderEvent {
    fn from(record: OrderBookRecord) -> Self {
        Self::new(OrderEventKind::New, record.rate, record.quantity)
    }
}

/// Full order book state at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub asks: Vec<OrderBookRecord>,
    pub bids: Vec<OrderBookRecord>,
    /// Last update id folded into this snapshot, when the exchange numbers updates.
    pub sequence: Option<u64>,
}

impl Snapshot {
    #[must_use]
    pub fn new(asks: Vec<OrderBookRecord>, bids: Vec<OrderBookRecord>) -> Self {
        Self {
            asks,
            bids,
            sequence: None,
        }
    }

    #[must_use]
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Translate the snapshot into the batch of New events that rebuilds it.
    #[must_use]
    pub fn into_update(self) -> BookUpdate {
        BookUpdate {
            asks: self.asks.into_iter().map(OrderEvent::from).collect(),
            bids: self.bids.into_iter().map(OrderEvent::from).collect(),
        }
    }
}

/// One batch of normalized events for a single market.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookUpdate {
    pub asks: Vec<OrderEvent>,
    pub bids: Vec<OrderEvent>,
}

impl BookUpdate {
    #[must_use]
    pub fn new(asks: Vec<OrderEvent>, bids: Vec<OrderEvent>) -> Self {
        Self { asks, bids }
    }

    /// Total number of events in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.asks.len() + self.bids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.asks.is_empty() && self.bids.is_empty()
    }
}
