//! Kraken exchange integration.

pub mod message;
pub mod settings;
pub mod stream;

pub use settings::KrakenSettings;
pub use stream::KrakenAdapter;
