use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("unknown exchange '{0}'")]
    UnknownExchange(String),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while decoding exchange payloads into book events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("unknown order event type {0}")]
    UnknownEventType(String),

    #[error("invalid decimal '{value}' in {field}")]
    InvalidDecimal { field: &'static str, value: String },

    #[error("invalid market name '{0}', expected ASSET/CURRENCY")]
    InvalidMarketName(String),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("snapshot fetch failed for {market}: {reason}")]
    Snapshot { market: String, reason: String },

    #[error("exchange rejected {market}: {reason}")]
    MarketRejected { market: String, reason: String },

    #[error("{exchange} does not support {operation}")]
    Unsupported {
        exchange: &'static str,
        operation: &'static str,
    },

    #[error("unknown market '{market}' on {exchange}")]
    UnknownMarket {
        exchange: &'static str,
        market: String,
    },

    #[error("connection not ready: {0}")]
    NotReady(String),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),
}

impl Error {
    /// Whether the lifecycle may recover from this error by reconnecting.
    ///
    /// Configuration and reference-data problems cannot be fixed by another
    /// connect attempt and must stop the stream.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Config(_)
                | Self::UnknownMarket { .. }
                | Self::MarketRejected { .. }
                | Self::Unsupported { .. }
                | Self::Url(_)
        )
    }

    /// Whether the error means the connection itself is broken.
    ///
    /// Anything else raised while subscribing concerns one market only.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::WebSocket(_) | Self::Io(_) | Self::Connection(_) | Self::ChannelClosed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}
