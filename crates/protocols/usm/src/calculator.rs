//! Conversion Engine
//!
//! Pure pricing functions: no I/O, no async, deterministic fixed-point math.
//!
//! # Units
//!
//! - ETH, USM and FUM amounts: 18-decimal fixed point (`Wad`)
//! - ETH/USD prices: USD per ETH, 18 decimals
//! - FUM prices: USD per FUM, 18 decimals
//! - Paid-out amounts round down, required-in amounts round up
//!
//! Every top-level conversion returns the adjustment factor its trade implies
//! together with the resulting adjustment; the caller persists both.

use serde::{Deserialize, Serialize};
use usm_core::constants::WAD;
use usm_core::{EngineConfig, ProtocolError, Rounding, Side, SignedWad, Timestamp, Wad};

use crate::constants::{FULL_DEBT_RATIO, MIN_ADJUSTMENT, NEUTRAL_ADJUSTMENT};
use crate::decay::exp_neg;
use crate::solvency::{check_if_underwater, debt_ratio, eth_buffer, SolvencyState};
use crate::spread::adjusted_eth_usd_price;
use crate::state::{LoadedState, MarketSnapshot};
use crate::wad::{checked_add, checked_sub, wad_div, wad_ln_down, wad_mul, wad_sqrt};

/// Result of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    /// Amount paid out to the user
    pub amount_out: Wad,
    /// Multiplier this trade applies to the bid/ask adjustment
    pub adjustment_factor: Wad,
    /// Decayed adjustment times `adjustment_factor`, to persist
    pub new_adjustment: Wad,
}

impl ConversionOutcome {
    fn unchanged(adjustment: Wad) -> Self {
        Self {
            amount_out: 0,
            adjustment_factor: NEUTRAL_ADJUSTMENT,
            new_adjustment: adjustment,
        }
    }
}

fn ensure_fum_has_value(nav: Wad) -> Result<Wad, ProtocolError> {
    if nav == 0 {
        return Err(ProtocolError::invalid_input(
            "FUM has no positive value at the current price",
        ));
    }
    Ok(nav)
}

fn next_adjustment(decayed: Wad, factor: Wad) -> Result<Wad, ProtocolError> {
    let rounding = if factor >= NEUTRAL_ADJUSTMENT {
        Rounding::Up
    } else {
        Rounding::Down
    };
    Ok(wad_mul(decayed, factor, rounding)?.max(MIN_ADJUSTMENT))
}

/// USD value of `eth` at `price`
pub fn eth_to_usm(price: Wad, eth: Wad, rounding: Rounding) -> Result<Wad, ProtocolError> {
    wad_mul(eth, price, rounding)
}

/// ETH worth `usm` dollars at `price`
pub fn usm_to_eth(price: Wad, usm: Wad, rounding: Rounding) -> Result<Wad, ProtocolError> {
    if price == 0 {
        return Err(ProtocolError::invalid_input("price must be positive"));
    }
    wad_div(usm, price, rounding)
}

/// ETH per USM for a trader on `side`.
///
/// Buying USM means selling ETH, so the ETH/USD price comes from the
/// opposite side.
pub fn usm_price(side: Side, price: Wad, adjustment: Wad) -> Result<Wad, ProtocolError> {
    let eth_usd = adjusted_eth_usd_price(side.opposite(), price, adjustment)?;
    let rounding = match side {
        Side::Buy => Rounding::Up,
        Side::Sell => Rounding::Down,
    };
    if eth_usd == 0 {
        return Err(ProtocolError::invalid_input("price must be positive"));
    }
    wad_div(WAD, eth_usd, rounding)
}

/// USD per FUM: the pool buffer shared across the FUM supply.
///
/// Before any FUM exists (or in prefund) the reserve price itself is used,
/// which issues one FUM per ETH. A buffer at or below zero prices FUM at 0.
pub fn fum_price(
    side: Side,
    price: Wad,
    pool_balance: Wad,
    effective_supply: Wad,
    fum_supply: Wad,
    prefund: bool,
) -> Result<Wad, ProtocolError> {
    if prefund || fum_supply == 0 {
        return Ok(price);
    }
    let rounding = match side {
        Side::Buy => Rounding::Up,
        Side::Sell => Rounding::Down,
    };
    let buffer = eth_buffer(price, pool_balance, effective_supply, rounding)?;
    if buffer <= 0 {
        return Ok(0);
    }
    wad_div(buffer as Wad, fum_supply, rounding)
}

/// USM minted for `eth_in`.
///
/// The ETH price slides down in proportion to the pool growth, so the
/// output integrates the price curve: `p0 * pool0 * ln(pool1 / pool0)`.
pub fn usm_from_mint(
    config: &EngineConfig,
    state: &LoadedState,
    eth_in: Wad,
) -> Result<ConversionOutcome, ProtocolError> {
    state.validate()?;
    let adjustment = state.bid_ask_adjustment(config)?;
    if eth_in == 0 {
        return Ok(ConversionOutcome::unchanged(adjustment));
    }
    let pool0 = state.pool_balance;
    if pool0 == 0 {
        return Err(ProtocolError::invalid_input(
            "cannot mint against an empty pool",
        ));
    }

    let price = adjusted_eth_usd_price(Side::Sell, state.current_price, adjustment)?;
    let pool1 = checked_add(pool0, eth_in, "usm_from_mint")?;
    let growth = wad_div(pool1, pool0, Rounding::Down)?;
    let usm_out = wad_mul(
        wad_mul(price, pool0, Rounding::Down)?,
        wad_ln_down(growth)?,
        Rounding::Down,
    )?;
    let factor = wad_div(pool0, pool1, Rounding::Down)?;

    tracing::debug!(%eth_in, %usm_out, %factor, "Priced mint");

    Ok(ConversionOutcome {
        amount_out: usm_out,
        adjustment_factor: factor,
        new_adjustment: next_adjustment(adjustment, factor)?,
    })
}

/// ETH returned for burning `usm_in`.
///
/// Inverse of the mint curve: `pool0 * (1 - e^(-usm_in / (p0 * pool0)))`.
/// The burn price is floored at `supply / pool` so USM never redeems for more
/// than its pro-rata share of the pool.
pub fn eth_from_burn(
    config: &EngineConfig,
    state: &LoadedState,
    usm_in: Wad,
) -> Result<ConversionOutcome, ProtocolError> {
    state.validate()?;
    let adjustment = state.bid_ask_adjustment(config)?;
    if usm_in == 0 {
        return Ok(ConversionOutcome::unchanged(adjustment));
    }
    if usm_in > state.stable_supply {
        return Err(ProtocolError::invalid_input(format!(
            "burn of {} exceeds USM supply {}",
            usm_in, state.stable_supply
        )));
    }
    let pool0 = state.pool_balance;
    if pool0 == 0 {
        return Err(ProtocolError::invalid_input("cannot burn against an empty pool"));
    }

    let pro_rata = wad_div(state.stable_supply, pool0, Rounding::Up)?;
    let price = adjusted_eth_usd_price(Side::Buy, state.current_price, adjustment)?.max(pro_rata);

    let pool_value = wad_mul(price, pool0, Rounding::Up)?;
    let exponent = wad_div(usm_in, pool_value, Rounding::Down)?;
    let remaining = exp_neg(exponent, Rounding::Up)?;
    let pool1 = wad_mul(pool0, remaining, Rounding::Up)?.min(pool0);
    let eth_out = checked_sub(pool0, pool1, "eth_from_burn")?;
    let factor = wad_div(pool0, pool1, Rounding::Up)?;

    tracing::debug!(%usm_in, %eth_out, %factor, "Priced burn");

    Ok(ConversionOutcome {
        amount_out: eth_out,
        adjustment_factor: factor,
        new_adjustment: next_adjustment(adjustment, factor)?,
    })
}

/// FUM issued for `eth_in`.
///
/// Priced at the mid-slide price `p0 * sqrt(pool1 / pool0)` using the
/// underwater-decayed USM supply. No slide applies in prefund, against an
/// empty pool, or while `debt_ratio` is above 100%.
///
/// FUM without a positive buy price (buffer at or below zero) cannot be
/// bought: `InvalidInput`.
pub fn fum_from_fund(
    config: &EngineConfig,
    state: &LoadedState,
    fum_supply: Wad,
    eth_in: Wad,
    debt_ratio: Wad,
    prefund: bool,
) -> Result<ConversionOutcome, ProtocolError> {
    state.validate()?;
    let adjustment = state.bid_ask_adjustment(config)?;
    if eth_in == 0 {
        return Ok(ConversionOutcome::unchanged(adjustment));
    }

    let pool0 = state.pool_balance;
    let price = adjusted_eth_usd_price(Side::Buy, state.current_price, adjustment)?;
    let underwater = check_if_underwater(
        config,
        state.stable_supply,
        pool0,
        state.current_price,
        state.underwater_since,
        state.timestamp,
    )?;

    let pool1 = checked_add(pool0, eth_in, "fum_from_fund")?;
    let factor = if prefund || pool0 == 0 || debt_ratio > FULL_DEBT_RATIO {
        NEUTRAL_ADJUSTMENT
    } else {
        wad_div(pool1, pool0, Rounding::Up)?
    };
    let mid_price = wad_mul(price, wad_sqrt(factor, Rounding::Up)?, Rounding::Up)?;

    let nav = ensure_fum_has_value(fum_price(
        Side::Buy,
        mid_price,
        pool0,
        underwater.supply_for_fum_buys,
        fum_supply,
        prefund,
    )?)?;
    let fum_out = wad_div(
        eth_to_usm(mid_price, eth_in, Rounding::Down)?,
        nav,
        Rounding::Down,
    )?;

    tracing::debug!(%eth_in, %fum_out, %factor, prefund, "Priced fund");

    Ok(ConversionOutcome {
        amount_out: fum_out,
        adjustment_factor: factor,
        new_adjustment: next_adjustment(adjustment, factor)?,
    })
}

/// ETH returned for redeeming `fum_in`.
///
/// The pool after the trade is estimated from the marginal price, and the
/// FUM is then priced at `p0 * sqrt(pool1 / pool0)`.
///
/// FUM without a positive sell price, before or after the slide, cannot be
/// redeemed: `InvalidInput`. A redemption too small to be worth one wei of
/// ETH is a no-op.
pub fn eth_from_defund(
    config: &EngineConfig,
    state: &LoadedState,
    fum_supply: Wad,
    fum_in: Wad,
) -> Result<ConversionOutcome, ProtocolError> {
    state.validate()?;
    let adjustment = state.bid_ask_adjustment(config)?;
    if fum_in == 0 {
        return Ok(ConversionOutcome::unchanged(adjustment));
    }
    if fum_in > fum_supply {
        return Err(ProtocolError::invalid_input(format!(
            "defund of {} exceeds FUM supply {}",
            fum_in, fum_supply
        )));
    }

    let pool0 = state.pool_balance;
    let supply = state.stable_supply;
    let price = adjusted_eth_usd_price(Side::Sell, state.current_price, adjustment)?;

    let marginal_nav =
        ensure_fum_has_value(fum_price(Side::Sell, price, pool0, supply, fum_supply, false)?)?;
    let marginal_eth = usm_to_eth(
        price,
        wad_mul(fum_in, marginal_nav, Rounding::Down)?,
        Rounding::Down,
    )?;
    if marginal_eth == 0 {
        return Ok(ConversionOutcome::unchanged(adjustment));
    }

    let pool1 = checked_sub(pool0, marginal_eth, "eth_from_defund")?;
    if pool1 == 0 {
        // Only reachable with no USM outstanding: the whole pool goes, no slide.
        return Ok(ConversionOutcome {
            amount_out: marginal_eth,
            adjustment_factor: NEUTRAL_ADJUSTMENT,
            new_adjustment: adjustment,
        });
    }

    let factor = wad_div(pool1, pool0, Rounding::Down)?;
    let mid_price = wad_mul(price, wad_sqrt(factor, Rounding::Down)?, Rounding::Down)?;
    if mid_price == 0 {
        return Err(ProtocolError::invalid_input(
            "defund slides the ETH price to zero",
        ));
    }
    let nav =
        ensure_fum_has_value(fum_price(Side::Sell, mid_price, pool0, supply, fum_supply, false)?)?;
    let eth_out = usm_to_eth(
        mid_price,
        wad_mul(fum_in, nav, Rounding::Down)?,
        Rounding::Down,
    )?;

    tracing::debug!(%fum_in, %eth_out, %factor, "Priced defund");

    Ok(ConversionOutcome {
        amount_out: eth_out,
        adjustment_factor: factor,
        new_adjustment: next_adjustment(adjustment, factor)?,
    })
}

/// Reject a post-trade state whose debt ratio exceeds the configured maximum
pub fn ensure_within_max_debt_ratio(
    config: &EngineConfig,
    price: Wad,
    pool_balance: Wad,
    stable_supply: Wad,
) -> Result<(), ProtocolError> {
    let ratio = debt_ratio(price, pool_balance, stable_supply)?;
    if ratio > config.max_debt_ratio {
        return Err(ProtocolError::ActionNotAllowed {
            reason: format!(
                "debt ratio {} would exceed the maximum {}",
                ratio, config.max_debt_ratio
            ),
        });
    }
    Ok(())
}

/// Derived market figures for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub timestamp: Timestamp,
    pub current_price: Wad,
    pub debt_ratio: Wad,
    pub solvency: SolvencyState,
    /// USD value of the pool above USM liabilities
    pub eth_buffer: SignedWad,
    /// Stored adjustment decayed to `timestamp`
    pub bid_ask_adjustment: Wad,
    /// ETH per USM
    pub usm_buy_price: Wad,
    pub usm_sell_price: Wad,
    /// USD per FUM
    pub fum_buy_price: Wad,
    pub fum_sell_price: Wad,
    pub supply_for_fum_buys: Wad,
    /// Minting USM (or redeeming FUM) is allowed at the current debt ratio
    pub can_mint_usm: bool,
}

/// Summarize a snapshot at its own timestamp
pub fn summarize(
    config: &EngineConfig,
    snapshot: &MarketSnapshot,
) -> Result<MarketSummary, ProtocolError> {
    let state = &snapshot.state;
    let price = state.current_price;
    let adjustment = state.bid_ask_adjustment(config)?;
    let check = check_if_underwater(
        config,
        state.stable_supply,
        state.pool_balance,
        price,
        state.underwater_since,
        state.timestamp,
    )?;

    let fum_buy_price = fum_price(
        Side::Buy,
        adjusted_eth_usd_price(Side::Buy, price, adjustment)?,
        state.pool_balance,
        check.supply_for_fum_buys,
        snapshot.fum_supply,
        false,
    )?;
    let fum_sell_price = fum_price(
        Side::Sell,
        adjusted_eth_usd_price(Side::Sell, price, adjustment)?,
        state.pool_balance,
        state.stable_supply,
        snapshot.fum_supply,
        false,
    )?;

    Ok(MarketSummary {
        timestamp: state.timestamp,
        current_price: price,
        debt_ratio: check.debt_ratio,
        solvency: check.solvency(),
        eth_buffer: eth_buffer(price, state.pool_balance, state.stable_supply, Rounding::Down)?,
        bid_ask_adjustment: adjustment,
        usm_buy_price: usm_price(Side::Buy, price, adjustment)?,
        usm_sell_price: usm_price(Side::Sell, price, adjustment)?,
        fum_buy_price,
        fum_sell_price,
        supply_for_fum_buys: check.supply_for_fum_buys,
        can_mint_usm: check.debt_ratio <= config.max_debt_ratio,
    })
}
