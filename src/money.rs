//! TAU amount validation and conversion.
//!
//! All user-facing amounts enter the system as strings and are converted to
//! [`rust_decimal::Decimal`] here. Nothing in the ledger ever touches binary
//! floating point: TAU is a money-like unit with two-decimal precision, and
//! every mutation path funnels through this module's validation.

use rust_decimal::Decimal;
use thiserror::Error;

/// Maximum decimal places for a TAU amount (cent-equivalent precision).
pub const TAU_SCALE: u32 = 2;

/// Amount validation/conversion errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Amount must be greater than zero")]
    NotPositive,

    #[error("Amount precision exceeds {max} decimal places")]
    PrecisionOverflow { max: u32 },

    #[error("Invalid amount format: {0}")]
    InvalidFormat(String),
}

/// Validate an already-parsed amount: strictly positive, at most two
/// decimal places.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, MoneyError> {
    if amount <= Decimal::ZERO {
        return Err(MoneyError::NotPositive);
    }
    // normalize() strips trailing zeros so "3.10" and "3.1" agree on scale
    if amount.normalize().scale() > TAU_SCALE {
        return Err(MoneyError::PrecisionOverflow { max: TAU_SCALE });
    }
    Ok(amount)
}

/// Parse a client-supplied amount string into a validated Decimal.
pub fn parse_amount(s: &str) -> Result<Decimal, MoneyError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(MoneyError::InvalidFormat("empty amount".to_string()));
    }
    let amount: Decimal = s
        .parse()
        .map_err(|_| MoneyError::InvalidFormat(s.to_string()))?;
    validate_amount(amount)
}

/// Format an amount for display with fixed two-decimal precision.
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_parse_valid() {
        assert_eq!(parse_amount("10").unwrap(), Decimal::from(10));
        assert_eq!(parse_amount("3.50").unwrap(), Decimal::new(350, 2));
        assert_eq!(parse_amount(" 0.01 ").unwrap(), Decimal::new(1, 2));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_amount("ten"),
            Err(MoneyError::InvalidFormat(_))
        ));
        assert!(matches!(parse_amount(""), Err(MoneyError::InvalidFormat(_))));
    }

    #[test]
    fn test_rejects_non_positive() {
        assert_eq!(parse_amount("0"), Err(MoneyError::NotPositive));
        assert_eq!(parse_amount("-5"), Err(MoneyError::NotPositive));
    }

    #[test]
    fn test_rejects_sub_cent_precision() {
        assert_eq!(
            parse_amount("1.001"),
            Err(MoneyError::PrecisionOverflow { max: 2 })
        );
        // Trailing zeros beyond scale 2 are fine
        assert!(parse_amount("1.100").is_ok());
    }

    #[test]
    fn test_format() {
        assert_eq!(format_amount(Decimal::from(10)), "10.00");
        assert_eq!(format_amount(Decimal::new(350, 2)), "3.50");
    }
}
