//! Single-side price level store.
//!
//! One [`OrderBookSide`] holds either the asks or the bids of a market. Levels
//! are kept unordered, keyed by rate; ordering is computed on query so that
//! the hot path (applying events) stays O(1).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::book::{OrderBookRecord, OrderEvent, OrderEventKind};
use super::money::{Rate, EPSILON};

/// Which side of the book a store holds.
///
/// Asks are best at the lowest rate, bids at the highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Ask,
    Bid,
}

impl Side {
    /// Whether `a` ranks strictly better than `b` on this side.
    #[must_use]
    pub fn is_better(self, a: Rate, b: Rate) -> bool {
        match self {
            Self::Ask => a < b,
            Self::Bid => a > b,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ask => write!(f, "ask"),
            Self::Bid => write!(f, "bid"),
        }
    }
}

/// Price levels for one side of one market.
#[derive(Debug, Clone)]
pub struct OrderBookSide {
    side: Side,
    levels: HashMap<Rate, OrderBookRecord>,
}

impl OrderBookSide {
    #[must_use]
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn side(&self) -> Side {
        self.side
    }

    /// Apply one event and report whether the stored levels changed.
    ///
    /// - `New` / `Update` insert or replace the level at `rate`.
    /// - `Delete` removes the level if present.
    /// - `Delta` adds the signed quantity to an existing level (or inserts it
    ///   when absent); a result at or below [`EPSILON`] removes the level.
    pub fn apply_event(&mut self, event: &OrderEvent) -> bool {
        match event.kind {
            OrderEventKind::New | OrderEventKind::Update => {
                let record = OrderBookRecord::new(event.rate, event.quantity);
                self.levels.insert(event.rate, record) != Some(record)
            }
            OrderEventKind::Delete => self.levels.remove(&event.rate).is_some(),
            OrderEventKind::Delta => self.apply_delta(event),
        }
    }

    fn apply_delta(&mut self, event: &OrderEvent) -> bool {
        let Some(record) = self.levels.get_mut(&event.rate) else {
            self.levels.insert(
                event.rate,
                OrderBookRecord::new(event.rate, event.quantity),
            );
            return true;
        };

        record.quantity += event.quantity;
        if record.quantity <= EPSILON {
            self.levels.remove(&event.rate);
        }
        !event.quantity.is_zero()
    }

    /// Apply a batch in order; returns whether any event changed the side.
    pub fn apply_all<'a, I>(&mut self, events: I) -> bool
    where
        I: IntoIterator<Item = &'a OrderEvent>,
    {
        events
            .into_iter()
            .fold(false, |changed, event| self.apply_event(event) | changed)
    }

    /// The `n` best levels, best first.
    ///
    /// Returns fewer than `n` records when the side is smaller.
    #[must_use]
    pub fn top(&self, n: usize) -> Vec<OrderBookRecord> {
        match n {
            0 => Vec::new(),
            1 => self.best().into_iter().collect(),
            _ => {
                let mut records: Vec<OrderBookRecord> = self.levels.values().copied().collect();
                match self.side {
                    Side::Ask => records.sort_unstable_by(|a, b| a.rate.cmp(&b.rate)),
                    Side::Bid => records.sort_unstable_by(|a, b| b.rate.cmp(&a.rate)),
                }
                records.truncate(n);
                records
            }
        }
    }

    /// Best level in a single pass.
    #[must_use]
    pub fn best(&self) -> Option<OrderBookRecord> {
        self.levels.values().copied().reduce(|best, record| {
            if self.side.is_better(record.rate, best.rate) {
                record
            } else {
                best
            }
        })
    }

    #[must_use]
    pub fn get(&self, rate: &Rate) -> Option<&OrderBookRecord> {
        self.levels.get(rate)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Drop every level; returns whether anything was removed.
    pub fn clear(&mut self) -> bool {
        let had_levels = !self.levels.is_empty();
        self.levels.clear();
        had_levels
    }
}
