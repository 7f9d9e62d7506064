//! Spread/Decay Calculator
//!
//! The bid/ask adjustment is a multiplier on the ETH/USD price. Buying
//! activity pushes it above 1.0, selling below; it decays back toward 1.0
//! with its own half-life. It is only ever applied against the requesting
//! side: buyers see `price * max(adj, 1)`, sellers `price * min(adj, 1)`.

use usm_core::constants::WAD;
use usm_core::{ProtocolError, Rounding, Side, Timestamp, Wad};

use crate::constants::NEUTRAL_ADJUSTMENT;
use crate::decay::{decay_factor, decay_toward};
use crate::wad::{mul_div, wad_mul};

/// Stored adjustment decayed toward 1.0 over `now - stored_at` seconds.
///
/// At zero elapsed time the stored value comes back unchanged. Rounding keeps
/// the result on the stored value's side of 1.0.
pub fn bid_ask_adjustment(
    stored: Wad,
    stored_at: Timestamp,
    now: Timestamp,
    half_life: Timestamp,
) -> Result<Wad, ProtocolError> {
    if stored == 0 {
        return Err(ProtocolError::invalid_input(
            "bid/ask adjustment must be positive",
        ));
    }
    if now < stored_at {
        return Err(ProtocolError::invalid_input(format!(
            "adjustment timestamp {} is after now ({})",
            stored_at, now
        )));
    }
    let factor = decay_factor(now - stored_at, half_life, Rounding::Up)?;
    decay_toward(stored, NEUTRAL_ADJUSTMENT, factor, Rounding::Up)
}

/// ETH/USD price seen by a trader on `side`
pub fn adjusted_eth_usd_price(side: Side, price: Wad, adjustment: Wad) -> Result<Wad, ProtocolError> {
    match side {
        Side::Buy if adjustment > WAD => wad_mul(price, adjustment, Rounding::Up),
        Side::Sell if adjustment < WAD => wad_mul(price, adjustment, Rounding::Down),
        _ => Ok(price),
    }
}

/// Rebase an adjustment onto a fresh oracle price.
///
/// The adjusted price `old_price * adjustment` is kept until the oracle moves
/// past it; an oracle move in the adjustment's own direction absorbs the
/// adjustment, one against it leaves the adjustment as it was.
pub fn rebase_adjustment(
    adjustment: Wad,
    old_price: Wad,
    new_price: Wad,
) -> Result<Wad, ProtocolError> {
    if new_price == 0 {
        return Err(ProtocolError::invalid_input("oracle price must be positive"));
    }
    if adjustment == NEUTRAL_ADJUSTMENT || old_price == new_price {
        return Ok(adjustment);
    }

    let rounding = if adjustment > NEUTRAL_ADJUSTMENT {
        Rounding::Up
    } else {
        Rounding::Down
    };
    let rebased = match mul_div(old_price, adjustment, new_price, rounding, "rebase_adjustment") {
        Ok(value) => value,
        Err(ProtocolError::ArithmeticOverflow { .. }) => Wad::MAX,
        Err(e) => return Err(e),
    };

    Ok(if adjustment > NEUTRAL_ADJUSTMENT {
        rebased.clamp(NEUTRAL_ADJUSTMENT, adjustment)
    } else {
        rebased.clamp(adjustment, NEUTRAL_ADJUSTMENT)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PRICE: Wad = 2_000 * WAD;

    #[test]
    fn test_adjustment_unchanged_at_zero_elapsed() {
        let stored = 1_234_567_890_123_456_789;
        assert_eq!(bid_ask_adjustment(stored, 100, 100, 60).unwrap(), stored);
        let stored = 876_543_210_987_654_321;
        assert_eq!(bid_ask_adjustment(stored, 100, 100, 60).unwrap(), stored);
    }

    #[test]
    fn test_adjustment_halves_distance_per_half_life() {
        // 1.2 -> 1.1 after one half-life, 0.8 -> 0.9
        assert_eq!(
            bid_ask_adjustment(1_200_000_000_000_000_000, 0, 60, 60).unwrap(),
            1_100_000_000_000_000_000
        );
        assert_eq!(
            bid_ask_adjustment(800_000_000_000_000_000, 0, 60, 60).unwrap(),
            900_000_000_000_000_000
        );
    }

    #[test]
    fn test_adjustment_fully_decays() {
        assert_eq!(bid_ask_adjustment(3 * WAD, 0, 60 * 200, 60).unwrap(), WAD);
        assert_eq!(bid_ask_adjustment(1, 0, 60 * 200, 60).unwrap(), WAD);
    }

    #[test]
    fn test_adjustment_rejects_bad_input() {
        assert!(bid_ask_adjustment(0, 0, 10, 60).is_err());
        assert!(bid_ask_adjustment(WAD, 20, 10, 60).is_err());
    }

    #[test]
    fn test_buy_side_only_penalized_above_one() {
        let up = 1_010_000_000_000_000_000;
        let down = 990_000_000_000_000_000;
        assert_eq!(adjusted_eth_usd_price(Side::Buy, PRICE, up).unwrap(), 2_020 * WAD);
        assert_eq!(adjusted_eth_usd_price(Side::Buy, PRICE, down).unwrap(), PRICE);
        assert_eq!(adjusted_eth_usd_price(Side::Sell, PRICE, down).unwrap(), 1_980 * WAD);
        assert_eq!(adjusted_eth_usd_price(Side::Sell, PRICE, up).unwrap(), PRICE);
    }

    #[test]
    fn test_rebase_absorbs_move_in_adjustment_direction() {
        // Adjusted price 2000 * 1.1 = 2200; oracle moves to 2100
        let rebased = rebase_adjustment(1_100_000_000_000_000_000, PRICE, 2_100 * WAD).unwrap();
        // 2200 / 2100 = 1.047619...
        assert_eq!(rebased, 1_047_619_047_619_047_620);

        // Oracle overtakes the adjusted price: back to neutral
        assert_eq!(
            rebase_adjustment(1_100_000_000_000_000_000, PRICE, 2_500 * WAD).unwrap(),
            WAD
        );

        // Move against the adjustment leaves it alone
        assert_eq!(
            rebase_adjustment(1_100_000_000_000_000_000, PRICE, 1_500 * WAD).unwrap(),
            1_100_000_000_000_000_000
        );
    }

    #[test]
    fn test_rebase_below_one() {
        // Adjusted price 2000 * 0.9 = 1800; oracle drops to 1900
        let rebased = rebase_adjustment(900_000_000_000_000_000, PRICE, 1_900 * WAD).unwrap();
        assert_eq!(rebased, 947_368_421_052_631_578);
        assert_eq!(
            rebase_adjustment(900_000_000_000_000_000, PRICE, 1_000 * WAD).unwrap(),
            WAD
        );
        assert!(rebase_adjustment(900_000_000_000_000_000, PRICE, 0).is_err());
    }

    proptest! {
        #[test]
        fn prop_adjustment_only_penalizes(
            price in 1u128..1u128 << 90,
            adjustment in 1u128..4 * WAD,
        ) {
            let buy = adjusted_eth_usd_price(Side::Buy, price, adjustment).unwrap();
            let sell = adjusted_eth_usd_price(Side::Sell, price, adjustment).unwrap();
            prop_assert!(buy >= price);
            prop_assert!(sell <= price);
        }

        #[test]
        fn prop_adjustment_decays_toward_neutral_without_overshoot(
            stored in 1u128..4 * WAD,
            earlier in 0u64..10_000,
            later in 0u64..10_000,
        ) {
            let (earlier, later) = (earlier.min(later), earlier.max(later));
            let a = bid_ask_adjustment(stored, 0, earlier, 60).unwrap();
            let b = bid_ask_adjustment(stored, 0, later, 60).unwrap();
            if stored >= WAD {
                prop_assert!(a >= WAD && b >= WAD && b <= a);
            } else {
                prop_assert!(a <= WAD && b <= WAD && b >= a);
            }
        }
    }
}
