//! Market identifier type.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// Standard market name in `ASSET/CURRENCY` form, e.g. `ETH/BTC`.
///
/// Adapters translate this to and from their native symbols. The inner
/// String is private so construction goes through the defined constructors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketName(String);

impl MarketName {
    /// Create a market name without validating its shape.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Build a market name from its asset and currency parts.
    pub fn from_parts(asset: &str, currency: &str) -> Self {
        Self(format!("{asset}/{currency}"))
    }

    /// Parse and validate an `ASSET/CURRENCY` string.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidMarketName`] if either part is missing.
    pub fn parse(name: &str) -> Result<Self, DataError> {
        match name.split_once('/') {
            Some((asset, currency))
                if !asset.is_empty() && !currency.is_empty() && !currency.contains('/') =>
            {
                Ok(Self(name.to_string()))
            }
            _ => Err(DataError::InvalidMarketName(name.to_string())),
        }
    }

    /// Get the market name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The traded asset (left of the slash).
    #[must_use]
    pub fn asset(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(a, _)| a)
    }

    /// The quote currency (right of the slash), empty if absent.
    #[must_use]
    pub fn currency(&self) -> &str {
        self.0.split_once('/').map_or("", |(_, c)| c)
    }
}

impl fmt::Display for MarketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MarketName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for MarketName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
