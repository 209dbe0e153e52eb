//! Generic connection lifecycle for streaming sources.
//!
//! - [`state`] - Connection states, commands and forwarded events
//! - [`backoff`] - Doubling reconnect delay
//! - [`readiness`] - FIFO gate for callers waiting on a connection
//! - [`connection`] - The state machine and its handle

pub mod backoff;
pub mod connection;
pub mod readiness;
pub mod state;

pub use backoff::Backoff;
pub use connection::{ConnectionLifecycle, LifecycleConfig, LifecycleHandle};
pub use readiness::Readiness;
pub use state::{Command, ConnectionState, StreamEvent};
