//! Per-market update sequence tracking.
//!
//! Exchanges that number their updates let us detect lost messages. After a
//! snapshot with id `S`:
//!
//! - updates ending at or before `S` are already folded into the snapshot
//! - the first applied update must start at or before `S + 1`
//! - every later update must start at exactly the previous end + 1

use std::collections::HashMap;

use crate::domain::MarketName;

/// Outcome of checking one update against the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// In order; the cursor has advanced.
    Apply,
    /// Entirely covered by the snapshot or a previous update.
    Stale,
    /// Updates were lost; the book must be rebuilt.
    Gap { expected: u64, received: u64 },
    /// No snapshot for this market yet.
    NoSnapshot,
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    last: u64,
    synced: bool,
}

/// Last applied update id per market.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    cursors: HashMap<MarketName, Cursor>,
}

impl SequenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking from a snapshot's last update id.
    pub fn reset(&mut self, market: MarketName, snapshot_id: u64) {
        self.cursors.insert(
            market,
            Cursor {
                last: snapshot_id,
                synced: false,
            },
        );
    }

    /// Check an update spanning ids `first..=last` and advance on success.
    pub fn check(&mut self, market: &MarketName, first: u64, last: u64) -> SequenceCheck {
        let Some(cursor) = self.cursors.get_mut(market) else {
            return SequenceCheck::NoSnapshot;
        };

        if last <= cursor.last {
            return SequenceCheck::Stale;
        }

        let expected = cursor.last + 1;
        let in_order = if cursor.synced {
            first == expected
        } else {
            first <= expected
        };
        if !in_order {
            return SequenceCheck::Gap {
                expected,
                received: first,
            };
        }

        cursor.last = last;
        cursor.synced = true;
        SequenceCheck::Apply
    }

    /// Last applied id for a market.
    #[must_use]
    pub fn last(&self, market: &MarketName) -> Option<u64> {
        self.cursors.get(market).map(|c| c.last)
    }

    pub fn remove(&mut self, market: &MarketName) {
        self.cursors.remove(market);
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
    }
}
