//! Two-sided order book for one traded symbol.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::book::{BookUpdate, OrderBookRecord, Snapshot};
use super::id::MarketName;
use super::side::{OrderBookSide, Side};

/// Notification sent when one side of a market changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketUpdate {
    Ask,
    Bid,
}

impl MarketUpdate {
    #[must_use]
    pub const fn side(self) -> Side {
        match self {
            Self::Ask => Side::Ask,
            Self::Bid => Side::Bid,
        }
    }
}

struct Book {
    asks: OrderBookSide,
    bids: OrderBookSide,
    updated_at: Option<DateTime<Utc>>,
}

/// Order book for one market.
///
/// Created once per symbol by the streamer and kept for the process lifetime.
/// A connection reset clears both sides; the next snapshot repopulates them.
/// Subscribers get one [`MarketUpdate`] per applied batch per changed side.
pub struct Market {
    name: MarketName,
    book: RwLock<Book>,
    tx: broadcast::Sender<MarketUpdate>,
}

impl Market {
    /// Create an empty market with a notification buffer of `capacity`.
    #[must_use]
    pub fn new(name: MarketName, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            name,
            book: RwLock::new(Book {
                asks: OrderBookSide::new(Side::Ask),
                bids: OrderBookSide::new(Side::Bid),
                updated_at: None,
            }),
            tx,
        }
    }

    #[must_use]
    pub fn name(&self) -> &MarketName {
        &self.name
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MarketUpdate> {
        self.tx.subscribe()
    }

    /// Replace the book contents with a snapshot.
    ///
    /// Both sides are cleared first, so levels absent from the snapshot do not
    /// survive a resync.
    pub fn apply_snapshot(&self, snapshot: Snapshot) {
        let update = snapshot.into_update();
        let (asks_changed, bids_changed) = {
            let mut book = self.book.write();
            let asks_cleared = book.asks.clear();
            let bids_cleared = book.bids.clear();
            let asks_changed = book.asks.apply_all(&update.asks) | asks_cleared;
            let bids_changed = book.bids.apply_all(&update.bids) | bids_cleared;
            book.updated_at = Some(Utc::now());
            (asks_changed, bids_changed)
        };
        self.notify(asks_changed, bids_changed);
    }

    /// Apply one batch of events.
    pub fn apply_update(&self, update: &BookUpdate) {
        let (asks_changed, bids_changed) = {
            let mut book = self.book.write();
            let asks_changed = book.asks.apply_all(&update.asks);
            let bids_changed = book.bids.apply_all(&update.bids);
            if asks_changed || bids_changed {
                book.updated_at = Some(Utc::now());
            }
            (asks_changed, bids_changed)
        };
        self.notify(asks_changed, bids_changed);
    }

    /// Drop every level on both sides.
    pub fn clear(&self) {
        let (asks_changed, bids_changed) = {
            let mut book = self.book.write();
            let changed = (book.asks.clear(), book.bids.clear());
            book.updated_at = None;
            changed
        };
        self.notify(asks_changed, bids_changed);
    }

    /// The `n` lowest asks, best first.
    #[must_use]
    pub fn top_asks(&self, n: usize) -> Vec<OrderBookRecord> {
        self.book.read().asks.top(n)
    }

    /// The `n` highest bids, best first.
    #[must_use]
    pub fn top_bids(&self, n: usize) -> Vec<OrderBookRecord> {
        self.book.read().bids.top(n)
    }

    #[must_use]
    pub fn top(&self, side: Side, n: usize) -> Vec<OrderBookRecord> {
        match side {
            Side::Ask => self.top_asks(n),
            Side::Bid => self.top_bids(n),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        let book = self.book.read();
        book.asks.is_empty() && book.bids.is_empty()
    }

    /// Number of (ask, bid) levels.
    #[must_use]
    pub fn depth(&self) -> (usize, usize) {
        let book = self.book.read();
        (book.asks.len(), book.bids.len())
    }

    /// When the book last changed, `None` while it holds no data.
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.book.read().updated_at
    }

    fn notify(&self, asks_changed: bool, bids_changed: bool) {
        // No receivers is fine
        if asks_changed {
            let _ = self.tx.send(MarketUpdate::Ask);
        }
        if bids_changed {
            let _ = self.tx.send(MarketUpdate::Bid);
        }
    }
}

impl std::fmt::Debug for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (asks, bids) = self.depth();
        f.debug_struct("Market")
            .field("name", &self.name)
            .field("asks", &asks)
            .field("bids", &bids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::{OrderEvent, OrderEventKind};
    use rust_decimal_macros::dec;
    use tokio::sync::broadcast::error::TryRecvError;

    fn market() -> Market {
        Market::new(MarketName::from("ETH/BTC"), 16)
    }

    fn snapshot() -> Snapshot {
        Snapshot::new(
            vec![
                OrderBookRecord::new(dec!(1), dec!(0.1)),
                OrderBookRecord::new(dec!(2), dec!(0.2)),
            ],
            vec![
                OrderBookRecord::new(dec!(1), dec!(0.1)),
                OrderBookRecord::new(dec!(2), dec!(0.2)),
            ],
        )
    }

    fn drain(rx: &mut broadcast::Receiver<MarketUpdate>) -> Vec<MarketUpdate> {
        let mut out = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(update) => out.push(update),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return out,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    #[test]
    fn snapshot_populates_both_sides() {
        let market = market();
        market.apply_snapshot(snapshot());

        assert_eq!(
            market.top_asks(1),
            vec![OrderBookRecord::new(dec!(1), dec!(0.1))]
        );
        assert_eq!(
            market.top_bids(1),
            vec![OrderBookRecord::new(dec!(2), dec!(0.2))]
        );
        assert!(market.updated_at().is_some());
    }

    #[test]
    fn snapshot_replaces_stale_levels() {
        let market = market();
        market.apply_update(&BookUpdate::new(
            vec![OrderEvent::new(OrderEventKind::New, dec!(9), dec!(1))],
            vec![],
        ));
        market.apply_snapshot(snapshot());

        assert_eq!(market.depth(), (2, 2));
        assert!(market.top_asks(5).iter().all(|r| r.rate != dec!(9)));
    }

    #[test]
    fn snapshot_notifies_each_side_once() {
        let market = market();
        let mut rx = market.subscribe();
        market.apply_snapshot(snapshot());

        assert_eq!(drain(&mut rx), vec![MarketUpdate::Ask, MarketUpdate::Bid]);
    }

    #[test]
    fn update_notifies_only_changed_side() {
        let market = market();
        market.apply_snapshot(snapshot());
        let mut rx = market.subscribe();

        market.apply_update(&BookUpdate::new(
            vec![],
            vec![OrderEvent::delta(dec!(2), dec!(0.5))],
        ));

        assert_eq!(drain(&mut rx), vec![MarketUpdate::Bid]);
        assert_eq!(
            market.top_bids(1),
            vec![OrderBookRecord::new(dec!(2), dec!(0.7))]
        );
    }

    #[test]
    fn noop_update_is_silent() {
        let market = market();
        let mut rx = market.subscribe();

        market.apply_update(&BookUpdate::new(vec![OrderEvent::delete(dec!(3))], vec![]));

        assert!(drain(&mut rx).is_empty());
        assert!(market.updated_at().is_none());
    }

    #[test]
    fn clear_empties_book_but_keeps_market() {
        let market = market();
        market.apply_snapshot(snapshot());
        let mut rx = market.subscribe();

        market.clear();

        assert!(market.is_empty());
        assert!(market.top(Side::Ask, 3).is_empty());
        assert!(market.updated_at().is_none());
        assert_eq!(drain(&mut rx), vec![MarketUpdate::Ask, MarketUpdate::Bid]);
        assert_eq!(market.name().as_str(), "ETH/BTC");
    }
}
