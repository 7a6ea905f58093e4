//! Fixed-point conversion for raw on-chain integers.
//!
//! Contracts report collateral, debt and prices as scaled integers
//! (token decimals for amounts, feed decimals for prices, 18 decimals for
//! ratios). These helpers convert them to exact decimals without routing
//! through floating point.

use alloy::primitives::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

/// WAD constant: 1e18 for 18-decimal fixed-point values
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Decimal places used by on-chain ratio values (collateral requirement, funding multiplier)
pub const RATIO_DECIMALS: u8 = 18;

/// Largest scale a Decimal can carry.
const MAX_SCALE: u8 = 28;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FixedPointError {
    #[error("value {0} does not fit in a 96-bit decimal mantissa")]
    Overflow(U256),
    #[error("scale {0} exceeds maximum decimal precision")]
    ScaleTooLarge(u8),
    #[error("raw value {0} is not a non-negative integer")]
    NotRawInteger(Decimal),
}

/// Fast power of 10 as U256.
#[inline(always)]
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// Convert a raw integer with `decimals` implied decimal places into a Decimal.
///
/// Example: `from_fixed_point(U256::from(1_500_000u64), 6)` == 1.5
pub fn from_fixed_point(raw: U256, decimals: u8) -> Result<Decimal, FixedPointError> {
    // Strip trailing zeros that would push the scale past Decimal's limit.
    let (mut raw, mut decimals) = (raw, decimals);
    let ten = U256::from(10u64);
    while decimals > MAX_SCALE && !raw.is_zero() && (raw % ten).is_zero() {
        raw /= ten;
        decimals -= 1;
    }
    if raw.is_zero() {
        return Ok(Decimal::ZERO);
    }
    if decimals > MAX_SCALE {
        return Err(FixedPointError::ScaleTooLarge(decimals));
    }

    let mantissa: i128 = i128::try_from(raw).map_err(|_| FixedPointError::Overflow(raw))?;
    Decimal::try_from_i128_with_scale(mantissa, decimals as u32)
        .map(|d| d.normalize())
        .map_err(|_| FixedPointError::Overflow(raw))
}

/// Convert an 18-decimal ratio (e.g. collateral requirement 1.2e18) into a Decimal.
#[inline]
pub fn from_wad(raw: U256) -> Result<Decimal, FixedPointError> {
    from_fixed_point(raw, RATIO_DECIMALS)
}

/// Read a raw on-chain integer that was carried as a Decimal.
pub fn raw_integer(value: Decimal) -> Result<U256, FixedPointError> {
    if (value.is_sign_negative() && !value.is_zero()) || !value.fract().is_zero() {
        return Err(FixedPointError::NotRawInteger(value));
    }
    value
        .to_u128()
        .map(U256::from)
        .ok_or(FixedPointError::NotRawInteger(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_fixed_point() {
        assert_eq!(from_fixed_point(U256::from(1_500_000u64), 6).unwrap(), dec!(1.5));
        assert_eq!(from_fixed_point(U256::from(125u64), 0).unwrap(), dec!(125));
        assert_eq!(from_fixed_point(U256::ZERO, 18).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_from_wad() {
        // 1.2 collateral requirement
        let raw = U256::from(1_200_000_000_000_000_000u128);
        assert_eq!(from_wad(raw).unwrap(), dec!(1.2));
        assert_eq!(from_wad(WAD).unwrap(), dec!(1));
    }

    #[test]
    fn test_large_scale_trailing_zeros() {
        // 1.0 expressed with 30 decimals strips down to a valid scale
        let raw = pow10(30);
        assert_eq!(from_fixed_point(raw, 30).unwrap(), dec!(1));

        // 30 decimals with significant trailing digits cannot be represented
        assert_eq!(
            from_fixed_point(U256::from(1u64), 30),
            Err(FixedPointError::ScaleTooLarge(30))
        );
    }

    #[test]
    fn test_overflow() {
        let raw = U256::MAX;
        assert!(matches!(from_fixed_point(raw, 18), Err(FixedPointError::Overflow(_))));
    }

    #[test]
    fn test_raw_integer() {
        assert_eq!(raw_integer(dec!(1500000)).unwrap(), U256::from(1_500_000u64));
        assert_eq!(raw_integer(Decimal::ZERO).unwrap(), U256::ZERO);
        assert_eq!(raw_integer(dec!(-3)), Err(FixedPointError::NotRawInteger(dec!(-3))));
        assert_eq!(raw_integer(dec!(1.5)), Err(FixedPointError::NotRawInteger(dec!(1.5))));
    }
}
