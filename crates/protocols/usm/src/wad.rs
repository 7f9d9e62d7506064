//! 18-decimal fixed-point arithmetic
//!
//! Every operation is checked and takes its rounding direction explicitly.
//! Products are formed in 256 bits and narrowed back to `u128` with an
//! overflow check, so nothing wraps.

use uint::construct_uint;
use usm_core::constants::{HALF_WAD, WAD};
use usm_core::{ProtocolError, Rounding, SignedWad, Wad};

use crate::constants::{FRACTION_BITS, LN_2};

construct_uint! {
    /// 256-bit intermediate for fixed-point products
    pub struct U256(4);
}

fn narrow(value: U256, operation: &'static str) -> Result<Wad, ProtocolError> {
    if value > U256::from(u128::MAX) {
        return Err(ProtocolError::ArithmeticOverflow { operation });
    }
    Ok(value.low_u128())
}

/// `a * b / denominator` with explicit rounding
pub fn mul_div(
    a: Wad,
    b: Wad,
    denominator: Wad,
    rounding: Rounding,
    operation: &'static str,
) -> Result<Wad, ProtocolError> {
    if denominator == 0 {
        return Err(ProtocolError::invalid_input(format!(
            "division by zero in {}",
            operation
        )));
    }
    let (quotient, remainder) = (U256::from(a) * U256::from(b)).div_mod(U256::from(denominator));
    let quotient = if rounding.is_up() && !remainder.is_zero() {
        quotient + U256::one()
    } else {
        quotient
    };
    narrow(quotient, operation)
}

/// `a * b` for two fixed-point values
pub fn wad_mul(a: Wad, b: Wad, rounding: Rounding) -> Result<Wad, ProtocolError> {
    mul_div(a, b, WAD, rounding, "wad_mul")
}

/// `a / b` for two fixed-point values
pub fn wad_div(a: Wad, b: Wad, rounding: Rounding) -> Result<Wad, ProtocolError> {
    mul_div(a, WAD, b, rounding, "wad_div")
}

pub fn checked_add(a: Wad, b: Wad, operation: &'static str) -> Result<Wad, ProtocolError> {
    a.checked_add(b)
        .ok_or(ProtocolError::ArithmeticOverflow { operation })
}

pub fn checked_sub(a: Wad, b: Wad, operation: &'static str) -> Result<Wad, ProtocolError> {
    a.checked_sub(b)
        .ok_or(ProtocolError::ArithmeticUnderflow { operation })
}

pub fn to_signed(value: Wad, operation: &'static str) -> Result<SignedWad, ProtocolError> {
    SignedWad::try_from(value).map_err(|_| ProtocolError::ArithmeticOverflow { operation })
}

/// Square root of a fixed-point value
pub fn wad_sqrt(x: Wad, rounding: Rounding) -> Result<Wad, ProtocolError> {
    let scaled = U256::from(x) * U256::from(WAD);
    let root = scaled.integer_sqrt();
    let root = if rounding.is_up() && root * root != scaled {
        root + U256::one()
    } else {
        root
    };
    narrow(root, "wad_sqrt")
}

/// log2(x) for x >= 1.0, rounded down.
///
/// Integer part by halving, fractional bits by repeated squaring.
pub fn wad_log2_down(x: Wad) -> Result<Wad, ProtocolError> {
    if x < WAD {
        return Err(ProtocolError::invalid_input(format!(
            "log2 argument {} is below 1.0",
            x
        )));
    }

    let two = 2 * WAD;
    let mut y = x;
    let mut whole: u128 = 0;
    while y >= two {
        y /= 2;
        whole += 1;
    }

    let mut result = whole * WAD;
    let mut bit = HALF_WAD;
    for _ in 0..FRACTION_BITS {
        if bit == 0 {
            break;
        }
        y = wad_mul(y, y, Rounding::Down)?;
        if y >= two {
            result += bit;
            y /= 2;
        }
        bit /= 2;
    }
    Ok(result)
}

/// Natural log of x >= 1.0, rounded down
pub fn wad_ln_down(x: Wad) -> Result<Wad, ProtocolError> {
    wad_mul(wad_log2_down(x)?, LN_2, Rounding::Down)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_wad_mul_rounding() {
        // 1 wei * 0.5 = 0.5 wei
        assert_eq!(wad_mul(1, HALF_WAD, Rounding::Down).unwrap(), 0);
        assert_eq!(wad_mul(1, HALF_WAD, Rounding::Up).unwrap(), 1);
        assert_eq!(wad_mul(3 * WAD, 2 * WAD, Rounding::Down).unwrap(), 6 * WAD);
    }

    #[test]
    fn test_wad_div_rounding() {
        assert_eq!(wad_div(WAD, 3 * WAD, Rounding::Down).unwrap(), 333_333_333_333_333_333);
        assert_eq!(wad_div(WAD, 3 * WAD, Rounding::Up).unwrap(), 333_333_333_333_333_334);
    }

    #[test]
    fn test_div_by_zero_is_invalid_input() {
        assert!(matches!(
            wad_div(WAD, 0, Rounding::Down),
            Err(ProtocolError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_large_intermediate_does_not_overflow() {
        // 1e6 ETH * $1e4: the raw product is 1e46, beyond u128.
        let pool = 1_000_000 * WAD;
        let price = 10_000 * WAD;
        assert_eq!(wad_mul(pool, price, Rounding::Down).unwrap(), 10_000_000_000 * WAD);
    }

    #[test]
    fn test_overflow_is_reported() {
        assert_eq!(
            wad_mul(u128::MAX, 2 * WAD, Rounding::Down),
            Err(ProtocolError::ArithmeticOverflow { operation: "wad_mul" })
        );
        assert!(checked_add(u128::MAX, 1, "add").is_err());
        assert_eq!(
            checked_sub(0, 1, "sub"),
            Err(ProtocolError::ArithmeticUnderflow { operation: "sub" })
        );
        assert!(to_signed(u128::MAX, "signed").is_err());
    }

    #[test]
    fn test_wad_sqrt() {
        assert_eq!(wad_sqrt(4 * WAD, Rounding::Down).unwrap(), 2 * WAD);
        assert_eq!(wad_sqrt(WAD, Rounding::Up).unwrap(), WAD);
        // sqrt(0.5) = 0.707106781186547524...
        assert_eq!(wad_sqrt(HALF_WAD, Rounding::Down).unwrap(), 707_106_781_186_547_524);
        assert_eq!(wad_sqrt(HALF_WAD, Rounding::Up).unwrap(), 707_106_781_186_547_525);
    }

    #[test]
    fn test_log2_exact_powers() {
        assert_eq!(wad_log2_down(WAD).unwrap(), 0);
        assert_eq!(wad_log2_down(2 * WAD).unwrap(), WAD);
        assert_eq!(wad_log2_down(8 * WAD).unwrap(), 3 * WAD);
        assert!(wad_log2_down(WAD - 1).is_err());
    }

    #[test]
    fn test_ln_close_to_reference() {
        // ln(2) = 0.693147180559945309...
        let ln2 = wad_ln_down(2 * WAD).unwrap();
        assert!(ln2 <= LN_2 && LN_2 - ln2 < 10);

        // ln(1.5) = 0.405465108108164381...
        let ln15 = wad_ln_down(3 * HALF_WAD).unwrap();
        let reference: Wad = 405_465_108_108_164_381;
        assert!(ln15 <= reference);
        assert!(reference - ln15 < 1_000);
    }

    proptest! {
        #[test]
        fn prop_mul_up_never_below_down(a in 0u128..1u128 << 80, b in 0u128..1u128 << 80) {
            let down = wad_mul(a, b, Rounding::Down).unwrap();
            let up = wad_mul(a, b, Rounding::Up).unwrap();
            prop_assert!(up >= down);
            prop_assert!(up - down <= 1);
        }

        #[test]
        fn prop_sqrt_brackets_root(x in 0u128..1u128 << 120) {
            let down = wad_sqrt(x, Rounding::Down).unwrap();
            let up = wad_sqrt(x, Rounding::Up).unwrap();
            let scaled = U256::from(x) * U256::from(WAD);
            prop_assert!(U256::from(down) * U256::from(down) <= scaled);
            prop_assert!(U256::from(up) * U256::from(up) >= scaled);
        }

        #[test]
        fn prop_log2_is_monotonic(x in WAD..1u128 << 100, dx in 0u128..1u128 << 90) {
            let lo = wad_log2_down(x).unwrap();
            let hi = wad_log2_down(x + dx).unwrap();
            prop_assert!(hi + 1_000 >= lo);
        }
    }
}
