//! Snapshot fetch port.

use async_trait::async_trait;

use crate::domain::Snapshot;
use crate::error::Result;

/// Fetches a full order book snapshot outside the stream.
///
/// Used by exchanges whose stream only carries deltas. The returned snapshot
/// should carry its `sequence` when the exchange numbers updates.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the current book for a native exchange symbol.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the payload cannot be parsed.
    /// Failures leave no partial state behind.
    async fn fetch_snapshot(&self, symbol: &str) -> Result<Snapshot>;
}
