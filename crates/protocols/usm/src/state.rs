//! USM State Snapshot
//!
//! `LoadedState` is the immutable input to every pricing computation. It is
//! built once per top-level call and never mutated; refreshing the price
//! yields a new snapshot.

use serde::{Deserialize, Serialize};
use usm_core::{EngineConfig, ProtocolError, Timestamp, Wad};

use crate::solvency::SolvencyState;
use crate::spread::bid_ask_adjustment;

/// Snapshot of everything the engine prices from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedState {
    /// Time the snapshot describes; decay is evaluated at this instant
    pub timestamp: Timestamp,
    /// When the debt ratio first exceeded the maximum (0 = not underwater)
    pub underwater_since: Timestamp,
    /// Cached ETH/USD price used for pricing
    pub current_price: Wad,
    /// Latest oracle ETH/USD price
    pub oracle_price: Wad,
    /// When `adjustment` was stored
    pub adjustment_timestamp: Timestamp,
    /// Stored bid/ask multiplier (1.0 at rest)
    pub adjustment: Wad,
    /// ETH held by the pool
    pub pool_balance: Wad,
    /// Outstanding USM
    pub stable_supply: Wad,
}

impl LoadedState {
    /// Check the snapshot invariants
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.adjustment == 0 {
            return Err(ProtocolError::invalid_input(
                "bid/ask adjustment must be positive",
            ));
        }
        if self.current_price == 0 {
            return Err(ProtocolError::invalid_input("price must be positive"));
        }
        if self.adjustment_timestamp > self.timestamp {
            return Err(ProtocolError::invalid_input(format!(
                "adjustment timestamp {} is after snapshot time {}",
                self.adjustment_timestamp, self.timestamp
            )));
        }
        if self.underwater_since > self.timestamp {
            return Err(ProtocolError::invalid_input(format!(
                "underwater-since {} is after snapshot time {}",
                self.underwater_since, self.timestamp
            )));
        }
        Ok(())
    }

    /// The stored adjustment decayed to the snapshot time
    pub fn bid_ask_adjustment(&self, config: &EngineConfig) -> Result<Wad, ProtocolError> {
        bid_ask_adjustment(
            self.adjustment,
            self.adjustment_timestamp,
            self.timestamp,
            config.bid_ask_adjustment_half_life,
        )
    }

    /// Solvency as last persisted
    pub fn solvency(&self) -> SolvencyState {
        SolvencyState::from_underwater_since(self.underwater_since)
    }

    /// A new snapshot priced at the fresh oracle reading
    pub fn with_fresh_price(&self, fresh: &FreshPrice) -> Self {
        if !fresh.price_changed {
            return *self;
        }
        Self {
            current_price: fresh.price,
            oracle_price: fresh.oracle_price,
            adjustment: fresh.adjustment,
            adjustment_timestamp: self.timestamp,
            ..*self
        }
    }
}

/// Outcome of comparing the cached price with a live oracle read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshPrice {
    /// Price to price from
    pub price: Wad,
    /// Raw oracle reading
    pub oracle_price: Wad,
    /// Adjustment rebased onto `price`, decayed to the snapshot time
    pub adjustment: Wad,
    /// Whether the caller must persist the new price and adjustment
    pub price_changed: bool,
}

/// A loaded state plus the FUM supply read alongside it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub state: LoadedState,
    pub fum_supply: Wad,
}
