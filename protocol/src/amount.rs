//! # Amounts
//!
//! Secrets and thresholds are unsigned 256-bit integers. No floats anywhere
//! near a threshold comparison: `99.999999999 >= 100` is a question we never
//! want to ask a floating-point unit.
//!
//! Amounts arriving as text (CLI flags, JSON from a frontend) go through
//! [`parse_amount`], which is where negative and fractional inputs die.

use ark_bn254::Fr;
use ark_ff::PrimeField;
use primitive_types::U256;

use crate::config::{MAX_VALUE_BITS, SECRET_ENCODING_LENGTH};
use crate::error::{PrismError, PrismResult};

/// Parse a decimal amount string.
///
/// Rejects signs, decimal points, exponents and anything else that is not a
/// plain run of ASCII digits with `InvalidInput`. Digit strings too wide for
/// 256 bits fail `ValueTooLarge`.
pub fn parse_amount(raw: &str) -> PrismResult<U256> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PrismError::InvalidInput("amount is empty".into()));
    }
    if trimmed.starts_with('-') {
        return Err(PrismError::InvalidInput(format!(
            "amount must be non-negative, got {trimmed}"
        )));
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PrismError::InvalidInput(format!(
            "amount must be a whole number, got {trimmed}"
        )));
    }

    U256::from_dec_str(trimmed).map_err(|_| PrismError::ValueTooLarge {
        bits: 256 + 1,
        max_bits: MAX_VALUE_BITS,
    })
}

/// Fail `ValueTooLarge` if `value` does not fit the backend field capacity.
pub fn ensure_fits_field(value: &U256) -> PrismResult<()> {
    let bits = value.bits();
    if bits > MAX_VALUE_BITS {
        return Err(PrismError::ValueTooLarge {
            bits,
            max_bits: MAX_VALUE_BITS,
        });
    }
    Ok(())
}

/// Fixed-width little-endian encoding used for hashing and encryption.
pub fn to_le_bytes(value: &U256) -> [u8; SECRET_ENCODING_LENGTH] {
    let mut out = [0u8; SECRET_ENCODING_LENGTH];
    value.to_little_endian(&mut out);
    out
}

/// Map an amount into the BN254 scalar field. Callers check
/// [`ensure_fits_field`] first, so the reduction never wraps.
pub fn to_field(value: &U256) -> Fr {
    Fr::from_le_bytes_mod_order(&to_le_bytes(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_integers() {
        assert_eq!(parse_amount("0").unwrap(), U256::zero());
        assert_eq!(parse_amount(" 500000000000 ").unwrap(), U256::from(500_000_000_000u64));
    }

    #[test]
    fn rejects_negative_and_fractional() {
        assert!(matches!(parse_amount("-5"), Err(PrismError::InvalidInput(_))));
        assert!(matches!(parse_amount("1.5"), Err(PrismError::InvalidInput(_))));
        assert!(matches!(parse_amount("1e9"), Err(PrismError::InvalidInput(_))));
        assert!(matches!(parse_amount("+7"), Err(PrismError::InvalidInput(_))));
        assert!(matches!(parse_amount(""), Err(PrismError::InvalidInput(_))));
    }

    #[test]
    fn rejects_wider_than_256_bits() {
        let huge = "9".repeat(100);
        assert!(matches!(parse_amount(&huge), Err(PrismError::ValueTooLarge { .. })));
    }

    #[test]
    fn field_capacity_boundary() {
        let max = (U256::one() << MAX_VALUE_BITS) - U256::one();
        assert!(ensure_fits_field(&max).is_ok());

        let over = U256::one() << MAX_VALUE_BITS;
        match ensure_fits_field(&over) {
            Err(PrismError::ValueTooLarge { bits, max_bits }) => {
                assert_eq!(bits, MAX_VALUE_BITS + 1);
                assert_eq!(max_bits, MAX_VALUE_BITS);
            }
            other => panic!("expected ValueTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn field_mapping_matches_small_values() {
        assert_eq!(to_field(&U256::from(42u64)), Fr::from(42u64));
    }

    #[test]
    fn le_encoding_is_fixed_width() {
        let bytes = to_le_bytes(&U256::from(0x0102u64));
        assert_eq!(bytes[0], 0x02);
        assert_eq!(bytes[1], 0x01);
        assert!(bytes[2..].iter().all(|b| *b == 0));
    }
}
