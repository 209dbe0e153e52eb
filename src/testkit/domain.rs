//! Builders for domain primitives used across tests.
//!
//! Rates and quantities are taken as strings so tests can write exact
//! decimal literals without importing the decimal macros.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::domain::{BookUpdate, MarketName, OrderBookRecord, OrderEvent, Snapshot};
use crate::port::AdapterEvent;

/// Parse a decimal literal. Panics on malformed input.
pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap_or_else(|_| panic!("bad decimal literal {value}"))
}

/// Create a [`MarketName`] from a string.
pub fn market(name: &str) -> MarketName {
    MarketName::from(name)
}

/// Create an [`OrderBookRecord`] from decimal literals.
pub fn record(rate: &str, quantity: &str) -> OrderBookRecord {
    OrderBookRecord::new(dec(rate), dec(quantity))
}

/// Build a snapshot from `(rate, quantity)` pairs.
pub fn snapshot(asks: &[(&str, &str)], bids: &[(&str, &str)]) -> Snapshot {
    Snapshot::new(
        asks.iter().map(|(r, q)| record(r, q)).collect(),
        bids.iter().map(|(r, q)| record(r, q)).collect(),
    )
}

/// Create an [`Initial`](AdapterEvent::Initial) event.
pub fn initial_event(name: &str, snapshot: Snapshot) -> AdapterEvent {
    AdapterEvent::Initial {
        market: market(name),
        snapshot,
    }
}

/// Create a [`Delta`](AdapterEvent::Delta) event.
pub fn delta_event(name: &str, asks: Vec<OrderEvent>, bids: Vec<OrderEvent>) -> AdapterEvent {
    AdapterEvent::Delta {
        market: market(name),
        update: BookUpdate::new(asks, bids),
    }
}

/// Create a [`Disconnected`](AdapterEvent::Disconnected) event.
pub fn disconnect_event(reason: &str) -> AdapterEvent {
    AdapterEvent::Disconnected {
        reason: reason.to_string(),
    }
}

/// Create a [`SubscriptionFailed`](AdapterEvent::SubscriptionFailed) event.
pub fn subscription_failed(name: &str, reason: &str) -> AdapterEvent {
    AdapterEvent::SubscriptionFailed {
        market: market(name),
        reason: reason.to_string(),
    }
}

/// Create a [`Gap`](AdapterEvent::Gap) event.
pub fn gap_event(name: &str, expected: u64, received: u64) -> AdapterEvent {
    AdapterEvent::Gap {
        market: market(name),
        expected,
        received,
    }
}
