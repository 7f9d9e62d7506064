//! Half-life decay
//!
//! `0.5^(elapsed / half_life)` evaluated entirely in fixed point:
//! whole half-lives are a right shift, and the fractional exponent is
//! consumed bit by bit against the chain sqrt(0.5), sqrt(sqrt(0.5)), ...
//! The result is bit-identical on every platform.

use usm_core::constants::{HALF_WAD, WAD};
use usm_core::{ProtocolError, Rounding, Timestamp, Wad};

use crate::constants::{FRACTION_BITS, LN_2, MAX_WHOLE_HALF_LIVES};
use crate::wad::{checked_add, checked_sub, mul_div, wad_div, wad_mul, wad_sqrt};

fn shift_right(value: Wad, bits: u32, rounding: Rounding) -> Wad {
    let shifted = value >> bits;
    if rounding.is_up() && (shifted << bits) != value {
        shifted + 1
    } else {
        shifted
    }
}

/// `0.5^exponent` for an 18-decimal exponent.
///
/// Exactly zero once the exponent reaches `MAX_WHOLE_HALF_LIVES`.
pub fn half_pow(exponent: Wad, rounding: Rounding) -> Result<Wad, ProtocolError> {
    let whole = exponent / WAD;
    if whole >= MAX_WHOLE_HALF_LIVES {
        return Ok(0);
    }

    let mut fraction = exponent % WAD;
    let mut factor = WAD;
    let mut root = HALF_WAD;
    for _ in 0..FRACTION_BITS {
        if fraction == 0 {
            break;
        }
        root = wad_sqrt(root, rounding)?;
        fraction *= 2;
        if fraction >= WAD {
            fraction -= WAD;
            factor = wad_mul(factor, root, rounding)?;
        }
    }

    Ok(shift_right(factor, whole as u32, rounding))
}

/// Decay factor after `elapsed` seconds with the given half-life
pub fn decay_factor(
    elapsed: Timestamp,
    half_life: Timestamp,
    rounding: Rounding,
) -> Result<Wad, ProtocolError> {
    if half_life == 0 {
        return Err(ProtocolError::invalid_input("half-life must be positive"));
    }
    if elapsed == 0 {
        return Ok(WAD);
    }
    // A smaller exponent gives a larger factor, so round the exponent the other way.
    let exponent = mul_div(
        elapsed as Wad,
        WAD,
        half_life as Wad,
        rounding.opposite(),
        "decay exponent",
    )?;
    half_pow(exponent, rounding)
}

/// `e^(-x)` for an 18-decimal x, via `0.5^(x / ln 2)`
pub fn exp_neg(x: Wad, rounding: Rounding) -> Result<Wad, ProtocolError> {
    let exponent = wad_div(x, LN_2, rounding.opposite())?;
    half_pow(exponent, rounding)
}

/// Move `value` toward `target`, keeping `factor` of the remaining distance.
///
/// `factor` must not exceed 1.0, so the result never crosses `target`.
/// `Rounding::Up` keeps the result on `value`'s side of any rounding slack.
pub fn decay_toward(
    value: Wad,
    target: Wad,
    factor: Wad,
    rounding: Rounding,
) -> Result<Wad, ProtocolError> {
    if factor > WAD {
        return Err(ProtocolError::invalid_input(format!(
            "decay factor {} exceeds 1.0",
            factor
        )));
    }
    if value >= target {
        let remaining = wad_mul(factor, value - target, rounding)?;
        checked_add(target, remaining, "decay_toward")
    } else {
        let remaining = wad_mul(factor, target - value, rounding)?;
        checked_sub(target, remaining, "decay_toward")
    }
}
