//! Cobinhood exchange integration.

pub mod message;
pub mod settings;
pub mod stream;

pub use settings::CobinhoodSettings;
pub use stream::CobinhoodAdapter;
