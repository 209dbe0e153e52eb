//! Poloniex exchange integration.
//!
//! Poloniex addresses order books by numeric channel id. The ids are not
//! discoverable over the socket, so they come from configuration.

pub mod message;
pub mod settings;
pub mod stream;

pub use settings::PoloniexSettings;
pub use stream::PoloniexAdapter;
