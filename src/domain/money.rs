//! Decimal types for rates and quantities.

use rust_decimal::Decimal;

/// Price of one level, represented as a Decimal for precision.
pub type Rate = Decimal;

/// Size resting at one level, represented as a Decimal for precision.
pub type Quantity = Decimal;

/// Quantities at or below this threshold count as an empty level.
pub const EPSILON: Quantity = Decimal::from_parts(1, 0, 0, false, 8);

/// Parse a wire decimal string.
pub(crate) fn parse_decimal(
    field: &'static str,
    value: &str,
) -> Result<Decimal, crate::error::DataError> {
    value
        .trim()
        .parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(value.trim()))
        .map_err(|_| crate::error::DataError::InvalidDecimal {
            field,
            value: value.to_string(),
        })
}
