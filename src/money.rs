//! Amount Normalization
//!
//! Every client-facing amount is canonicalized to a fixed 4-decimal-place
//! representation before it touches the ledger. All conversions MUST go
//! through this module.
//!
//! ## Design Principles
//! 1. Explicit Error Handling: malformed input is rejected, never truncated
//! 2. No Binary Floats: balances live in `rust_decimal::Decimal` end to end
//! 3. Half-Up Rounding: excess precision rounds half-up to 4 places

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use thiserror::Error;

/// Fixed scale for every monetary column (NUMERIC(20, 4)).
pub const AMOUNT_SCALE: u32 = 4;

/// Amount validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Amount must be greater than zero")]
    NotPositive,

    #[error("Invalid amount format: {0}")]
    InvalidFormat(String),
}

/// Canonicalize a decimal amount: reject non-positive values, round half-up
/// to exactly [`AMOUNT_SCALE`] decimal places.
pub fn normalize(amount: Decimal) -> Result<Decimal, MoneyError> {
    let rounded =
        amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);

    // Checked after rounding: an amount below 0.00005 is zero at ledger scale.
    if rounded <= Decimal::ZERO {
        return Err(MoneyError::NotPositive);
    }

    Ok(rounded)
}

/// Parse and canonicalize a client-provided amount string.
///
/// Stricter than `Decimal::from_str`: explicit plus signs, scientific
/// notation and empty strings are rejected up front so the accepted grammar
/// stays plain `digits[.digits]`.
pub fn normalize_str(amount_str: &str) -> Result<Decimal, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('+') {
        return Err(MoneyError::InvalidFormat("explicit plus sign".into()));
    }

    if amount_str.contains(['e', 'E']) {
        return Err(MoneyError::InvalidFormat("scientific notation".into()));
    }

    let dec =
        Decimal::from_str(amount_str).map_err(|e| MoneyError::InvalidFormat(e.to_string()))?;

    normalize(dec)
}

/// Render an amount at the canonical 4-place scale (e.g. `100.0000`).
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.prec$}", amount, prec = AMOUNT_SCALE as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn normalize_rounds_half_up_to_four_places() {
        assert_eq!(normalize(dec("1.23455")).unwrap(), dec("1.2346"));
        assert_eq!(normalize(dec("1.23454")).unwrap(), dec("1.2345"));
        assert_eq!(normalize(dec("100")).unwrap(), dec("100"));
        assert_eq!(format_amount(normalize(dec("100")).unwrap()), "100.0000");
    }

    #[test]
    fn normalize_rejects_non_positive() {
        assert_eq!(normalize(Decimal::ZERO), Err(MoneyError::NotPositive));
        assert_eq!(normalize(dec("-1.5")), Err(MoneyError::NotPositive));
        // 0.00001 rounds to 0.0000 at ledger scale
        assert_eq!(normalize(dec("0.00001")), Err(MoneyError::NotPositive));
        // 0.00005 rounds half-up to the smallest representable amount
        assert_eq!(normalize(dec("0.00005")).unwrap(), dec("0.0001"));
    }

    #[test]
    fn normalize_str_accepts_plain_decimals() {
        assert_eq!(normalize_str("100.00").unwrap(), dec("100.00"));
        assert_eq!(normalize_str("  30.5  ").unwrap(), dec("30.5"));
        assert_eq!(normalize_str("0.0001").unwrap(), dec("0.0001"));
    }

    #[test]
    fn normalize_str_rejects_malformed_input() {
        let cases = ["", "abc", "1,000.00", "1.2.3", "+1.23", "1e2", "1E2"];
        for case in cases {
            assert!(
                matches!(normalize_str(case), Err(MoneyError::InvalidFormat(_))),
                "should reject: {:?}",
                case
            );
        }
        assert_eq!(normalize_str("-5"), Err(MoneyError::NotPositive));
        assert_eq!(normalize_str("0"), Err(MoneyError::NotPositive));
    }

    #[test]
    fn format_amount_is_fixed_scale() {
        assert_eq!(format_amount(dec("90")), "90.0000");
        assert_eq!(format_amount(dec("30.5")), "30.5000");
        assert_eq!(format_amount(dec("0.0001")), "0.0001");
    }
}
