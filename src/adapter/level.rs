//! Price level arrays as exchanges send them.

use std::fmt;

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::domain::money::parse_decimal;
use crate::domain::{OrderBookRecord, OrderEvent};
use crate::error::DataError;

/// `[price, size, ...]` with decimal strings; trailing fields are ignored.
///
/// Binance sends two elements, Kraken adds a timestamp and an optional
/// republish flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireLevel {
    pub price: String,
    pub size: String,
}

impl WireLevel {
    #[must_use]
    pub fn new(price: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            size: size.into(),
        }
    }

    /// Parse into a snapshot record.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidDecimal`] for malformed numbers.
    pub fn record(&self) -> Result<OrderBookRecord, DataError> {
        Ok(OrderBookRecord::new(
            parse_decimal("price", &self.price)?,
            parse_decimal("size", &self.size)?,
        ))
    }

    /// Parse into an absolute level update (zero size deletes).
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidDecimal`] for malformed numbers.
    pub fn level_event(&self) -> Result<OrderEvent, DataError> {
        let record = self.record()?;
        Ok(OrderEvent::level(record.rate, record.quantity))
    }
}

/// Parse a list of levels into snapshot records.
pub(crate) fn records(levels: &[WireLevel]) -> Result<Vec<OrderBookRecord>, DataError> {
    levels.iter().map(WireLevel::record).collect()
}

/// Parse a list of levels into absolute level updates.
pub(crate) fn level_events(levels: &[WireLevel]) -> Result<Vec<OrderEvent>, DataError> {
    levels.iter().map(WireLevel::level_event).collect()
}

impl<'de> Deserialize<'de> for WireLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LevelVisitor;

        impl<'de> Visitor<'de> for LevelVisitor {
            type Value = WireLevel;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an array of at least [price, size]")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<WireLevel, A::Error> {
                let price: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let size: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(WireLevel { price, size })
            }
        }

        deserializer.deserialize_seq(LevelVisitor)
    }
}
