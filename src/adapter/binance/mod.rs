//! Binance exchange integration.
//!
//! Depth updates arrive on the combined stream; the initial book comes from
//! the REST depth endpoint and is stitched to the stream with `U`/`u` ids.

pub mod message;
pub mod rest;
pub mod settings;
pub mod stream;

pub use rest::BinanceRestClient;
pub use settings::BinanceSettings;
pub use stream::BinanceAdapter;
