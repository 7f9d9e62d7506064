//! State Loader
//!
//! Reads pool, supply, oracle, and persisted adjustment values from the
//! collaborators and assembles a `LoadedState`. Nothing here writes: fresh
//! prices and adjustments are handed back for the caller to persist.

use serde::{Deserialize, Serialize};
use usm_core::{EngineConfig, ProtocolError, Timestamp, TokenKind, Wad};

use crate::spread::rebase_adjustment;
use crate::state::{FreshPrice, LoadedState, MarketSnapshot};

/// Live ETH/USD price source
pub trait PriceOracle {
    fn latest_price(&self) -> Result<Wad, ProtocolError>;
}

/// Token supplies and the pool reserve
pub trait TokenLedger {
    fn total_supply(&self, token: TokenKind) -> Result<Wad, ProtocolError>;
    fn reserve_balance(&self) -> Result<Wad, ProtocolError>;
}

/// Values persisted between operations
pub trait PersistedState {
    /// Cached ETH/USD price (0 = never cached)
    fn stored_price(&self) -> Result<Wad, ProtocolError>;
    fn stored_adjustment(&self) -> Result<StoredAdjustment, ProtocolError>;
    /// 0 = not underwater
    fn underwater_since(&self) -> Result<Timestamp, ProtocolError>;
}

/// Bid/ask adjustment with the time it was stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAdjustment {
    pub value: Wad,
    pub timestamp: Timestamp,
}

fn read<T>(result: Result<T, ProtocolError>, what: &str) -> Result<T, ProtocolError> {
    result.map_err(|e| match e {
        ProtocolError::StateUnavailable { .. } => e,
        other => ProtocolError::StateUnavailable {
            reason: format!("{}: {}", what, other),
        },
    })
}

fn read_oracle_price(oracle: &impl PriceOracle) -> Result<Wad, ProtocolError> {
    let price = read(oracle.latest_price(), "Oracle price")?;
    if price == 0 {
        return Err(ProtocolError::StateUnavailable {
            reason: "Oracle returned a zero price".to_string(),
        });
    }
    Ok(price)
}

/// Assemble a snapshot at `now`.
///
/// When no price has been cached yet the oracle price becomes the current
/// price.
pub fn load_state(
    ledger: &impl TokenLedger,
    oracle: &impl PriceOracle,
    store: &impl PersistedState,
    now: Timestamp,
) -> Result<MarketSnapshot, ProtocolError> {
    let pool_balance = read(ledger.reserve_balance(), "Reserve balance")?;
    let stable_supply = read(ledger.total_supply(TokenKind::Usm), "USM supply")?;
    let fum_supply = read(ledger.total_supply(TokenKind::Fum), "FUM supply")?;
    let adjustment = read(store.stored_adjustment(), "Stored adjustment")?;
    let underwater_since = read(store.underwater_since(), "Underwater timestamp")?;
    let stored_price = read(store.stored_price(), "Stored price")?;
    let oracle_price = read_oracle_price(oracle)?;

    let current_price = if stored_price == 0 {
        oracle_price
    } else {
        stored_price
    };

    let state = LoadedState {
        timestamp: now,
        underwater_since,
        current_price,
        oracle_price,
        adjustment_timestamp: adjustment.timestamp,
        adjustment: adjustment.value,
        pool_balance,
        stable_supply,
    };
    state.validate()?;

    tracing::debug!(
        pool = %pool_balance,
        usm = %stable_supply,
        fum = %fum_supply,
        price = %current_price,
        "Loaded USM state at {}",
        now
    );

    Ok(MarketSnapshot { state, fum_supply })
}

/// Compare the cached price with a live oracle read.
///
/// On a change the decayed adjustment is rebased onto the new price. The
/// returned adjustment is always decayed to `state.timestamp`.
pub fn check_for_fresh_oracle_price(
    config: &EngineConfig,
    state: &LoadedState,
    oracle: &impl PriceOracle,
) -> Result<FreshPrice, ProtocolError> {
    let oracle_price = read_oracle_price(oracle)?;
    let adjustment = state.bid_ask_adjustment(config)?;

    if oracle_price == state.current_price {
        return Ok(FreshPrice {
            price: state.current_price,
            oracle_price,
            adjustment,
            price_changed: false,
        });
    }

    let rebased = rebase_adjustment(adjustment, state.current_price, oracle_price)?;
    tracing::info!(
        old_price = %state.current_price,
        new_price = %oracle_price,
        adjustment = %rebased,
        "Oracle price moved"
    );

    Ok(FreshPrice {
        price: oracle_price,
        oracle_price,
        adjustment: rebased,
        price_changed: true,
    })
}

/// Load a snapshot and reprice it at the live oracle price
pub fn load_fresh_state(
    config: &EngineConfig,
    ledger: &impl TokenLedger,
    oracle: &impl PriceOracle,
    store: &impl PersistedState,
    now: Timestamp,
) -> Result<(MarketSnapshot, FreshPrice), ProtocolError> {
    let snapshot = load_state(ledger, oracle, store, now)?;
    let fresh = check_for_fresh_oracle_price(config, &snapshot.state, oracle)?;
    let refreshed = MarketSnapshot {
        state: snapshot.state.with_fresh_price(&fresh),
        fum_supply: snapshot.fum_supply,
    };
    Ok((refreshed, fresh))
}
