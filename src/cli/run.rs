//! Foreground streaming until Ctrl-C.

use std::fmt::Write as _;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{Market, OrderBookRecord};
use crate::error::Result;
use crate::factory::build_streamer;

/// Stream the configured markets, logging the top of book on every change.
///
/// Returns when Ctrl-C is received or the connection stops for good.
///
/// # Errors
///
/// Returns the error that stopped the connection.
pub async fn execute(config: Config, depth: usize) -> Result<()> {
    let mut streamer = build_streamer(config.exchange, &config);
    let exchange = streamer.exchange_name();

    let markets = config.market_names();
    if markets.is_empty() {
        warn!(exchange, "No markets configured, nothing to stream");
    }

    let mut watchers = JoinSet::new();
    for name in markets {
        let market = streamer.market(name);
        watchers.spawn(watch_market(exchange, market, depth));
    }

    let result = tokio::select! {
        result = streamer.closed() => result,
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    watchers.abort_all();
    let shutdown = streamer.shutdown().await;
    result.and(shutdown)
}

async fn watch_market(exchange: &'static str, market: Arc<Market>, depth: usize) {
    let mut updates = market.subscribe();
    loop {
        match updates.recv().await {
            Ok(update) => {
                let side = update.side();
                let levels = market.top(side, depth);
                info!(
                    exchange,
                    market = %market.name(),
                    side = %side,
                    levels = %format_levels(&levels),
                    "Book updated"
                );
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(exchange, market = %market.name(), skipped, "Book notifications lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// `rate x quantity` pairs, best first.
fn format_levels(levels: &[OrderBookRecord]) -> String {
    let mut out = String::new();
    for (i, level) in levels.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{} x {}", level.rate, level.quantity);
    }
    if out.is_empty() {
        out.push_str("empty");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::record;

    #[test]
    fn formats_levels_best_first() {
        let levels = vec![record("0.0305", "1.2"), record("0.0306", "3")];
        assert_eq!(format_levels(&levels), "0.0305 x 1.2, 0.0306 x 3");
        assert_eq!(format_levels(&[]), "empty");
    }
}
