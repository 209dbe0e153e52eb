//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`adapter`] - Mock [`ExchangeAdapter`](crate::port::ExchangeAdapter)
//!   implementations: `ScriptedAdapter`, `ChannelAdapter`.
//! - [`domain`] - Builders for markets, records, snapshots and events.

pub mod adapter;
pub mod domain;
