//! Solvency Monitor
//!
//! Debt ratio, pool buffer, and the underwater state machine. While the
//! system is underwater, the USM supply assumed for FUM buy pricing decays
//! from the 80%-debt-ratio supply toward the 100%-debt-ratio supply, lowering
//! the FUM buy price the longer the system stays underwater.

use serde::{Deserialize, Serialize};
use usm_core::{EngineConfig, ProtocolError, Rounding, SignedWad, Timestamp, Wad};

use crate::constants::FULL_DEBT_RATIO;
use crate::decay::{decay_factor, decay_toward};
use crate::wad::{to_signed, wad_div, wad_mul};

/// Solvency state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SolvencyState {
    Solvent,
    Underwater { since: Timestamp },
}

impl SolvencyState {
    /// Interpret a persisted underwater-since timestamp (0 = solvent)
    pub fn from_underwater_since(since: Timestamp) -> Self {
        if since == 0 {
            Self::Solvent
        } else {
            Self::Underwater { since }
        }
    }

    pub fn is_underwater(&self) -> bool {
        matches!(self, Self::Underwater { .. })
    }
}

/// Result of an underwater check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderwaterCheck {
    /// New underwater-since timestamp for the caller to persist (0 = solvent)
    pub underwater_since: Timestamp,
    /// USM supply to use when pricing FUM buys
    pub supply_for_fum_buys: Wad,
    pub debt_ratio: Wad,
}

impl UnderwaterCheck {
    pub fn solvency(&self) -> SolvencyState {
        SolvencyState::from_underwater_since(self.underwater_since)
    }
}

/// Debt ratio = stable supply / (pool * price), rounded up.
///
/// Returns 0 when the pool or the price is zero. That case should not occur
/// once the protocol is live.
pub fn debt_ratio(price: Wad, pool_balance: Wad, stable_supply: Wad) -> Result<Wad, ProtocolError> {
    if pool_balance == 0 || price == 0 {
        return Ok(0);
    }
    let pool_value = wad_mul(pool_balance, price, Rounding::Down)?;
    if pool_value == 0 {
        return Ok(0);
    }
    wad_div(stable_supply, pool_value, Rounding::Up)
}

/// Pool value in excess of (or short of) USM liabilities, in USD.
///
/// Mint limits use `Rounding::Down`, burn limits `Rounding::Up`.
pub fn eth_buffer(
    price: Wad,
    pool_balance: Wad,
    stable_supply: Wad,
    rounding: Rounding,
) -> Result<SignedWad, ProtocolError> {
    let pool_value = to_signed(wad_mul(pool_balance, price, rounding)?, "eth_buffer")?;
    let liabilities = to_signed(stable_supply, "eth_buffer")?;
    pool_value
        .checked_sub(liabilities)
        .ok_or(ProtocolError::ArithmeticUnderflow {
            operation: "eth_buffer",
        })
}

/// USM supply at which the debt ratio would equal `ratio`
pub fn usm_supply_for_debt_ratio(
    price: Wad,
    pool_balance: Wad,
    ratio: Wad,
    rounding: Rounding,
) -> Result<Wad, ProtocolError> {
    wad_mul(wad_mul(pool_balance, price, rounding)?, ratio, rounding)
}

/// Update the underwater state and derive the supply used for FUM buys.
///
/// The returned `underwater_since` is set to `now` when the debt ratio first
/// exceeds the maximum, kept while it stays above, and cleared to 0 on
/// recovery. The caller persists it.
pub fn check_if_underwater(
    config: &EngineConfig,
    actual_supply: Wad,
    pool_balance: Wad,
    price: Wad,
    old_underwater_since: Timestamp,
    now: Timestamp,
) -> Result<UnderwaterCheck, ProtocolError> {
    let ratio = debt_ratio(price, pool_balance, actual_supply)?;

    let underwater_since = if ratio > config.max_debt_ratio {
        if old_underwater_since == 0 {
            if now == 0 {
                return Err(ProtocolError::invalid_input(
                    "timestamp 0 is reserved for the solvent state",
                ));
            }
            tracing::warn!(
                debt_ratio = %ratio,
                max_debt_ratio = %config.max_debt_ratio,
                "System went underwater at {}",
                now
            );
            now
        } else {
            old_underwater_since
        }
    } else {
        if old_underwater_since != 0 {
            tracing::info!(
                debt_ratio = %ratio,
                "System recovered after being underwater since {}",
                old_underwater_since
            );
        }
        0
    };

    let supply_for_fum_buys = if underwater_since == 0 {
        actual_supply
    } else {
        if now < underwater_since {
            return Err(ProtocolError::invalid_input(format!(
                "now ({}) is before underwater-since ({})",
                now, underwater_since
            )));
        }
        // Rounded down throughout: a smaller supply keeps the FUM buy price higher.
        let supply_at_max = usm_supply_for_debt_ratio(
            price,
            pool_balance,
            config.max_debt_ratio,
            Rounding::Down,
        )?;
        let supply_at_full =
            usm_supply_for_debt_ratio(price, pool_balance, FULL_DEBT_RATIO, Rounding::Down)?;
        let factor = decay_factor(
            now - underwater_since,
            config.min_fum_buy_price_half_life,
            Rounding::Up,
        )?;
        decay_toward(supply_at_max, supply_at_full, factor, Rounding::Up)?.min(actual_supply)
    };

    Ok(UnderwaterCheck {
        underwater_since,
        supply_for_fum_buys,
        debt_ratio: ratio,
    })
}
