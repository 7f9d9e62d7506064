//! In-memory market
//!
//! Implements every collaborator trait from plain fields. Backs the quote
//! API and the tests.

use serde::{Deserialize, Serialize};
use usm_core::{ProtocolError, Timestamp, TokenKind, Wad};

use crate::constants::NEUTRAL_ADJUSTMENT;
use crate::fetch::{PersistedState, PriceOracle, StoredAdjustment, TokenLedger};
use crate::solvency::UnderwaterCheck;
use crate::state::FreshPrice;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryMarket {
    pub reserve_balance: Wad,
    pub usm_supply: Wad,
    pub fum_supply: Wad,
    /// Latest oracle reading (0 = no price published)
    pub oracle_price: Wad,
    pub stored_price: Wad,
    pub adjustment: StoredAdjustment,
    pub underwater_since: Timestamp,
}

impl Default for MemoryMarket {
    fn default() -> Self {
        Self {
            reserve_balance: 0,
            usm_supply: 0,
            fum_supply: 0,
            oracle_price: 0,
            stored_price: 0,
            adjustment: StoredAdjustment {
                value: NEUTRAL_ADJUSTMENT,
                timestamp: 0,
            },
            underwater_since: 0,
        }
    }
}

impl MemoryMarket {
    /// Persist a price check taken at `now`
    pub fn record_fresh_price(&mut self, fresh: &FreshPrice, now: Timestamp) {
        if !fresh.price_changed {
            return;
        }
        self.stored_price = fresh.price;
        self.adjustment = StoredAdjustment {
            value: fresh.adjustment,
            timestamp: now,
        };
    }

    /// Persist the underwater-since timestamp from a solvency check
    pub fn record_underwater(&mut self, check: &UnderwaterCheck) {
        self.underwater_since = check.underwater_since;
    }
}

impl PriceOracle for MemoryMarket {
    fn latest_price(&self) -> Result<Wad, ProtocolError> {
        if self.oracle_price == 0 {
            return Err(ProtocolError::StateUnavailable {
                reason: "No oracle price published".to_string(),
            });
        }
        Ok(self.oracle_price)
    }
}

impl TokenLedger for MemoryMarket {
    fn total_supply(&self, token: TokenKind) -> Result<Wad, ProtocolError> {
        Ok(match token {
            TokenKind::Usm => self.usm_supply,
            TokenKind::Fum => self.fum_supply,
        })
    }

    fn reserve_balance(&self) -> Result<Wad, ProtocolError> {
        Ok(self.reserve_balance)
    }
}

impl PersistedState for MemoryMarket {
    fn stored_price(&self) -> Result<Wad, ProtocolError> {
        Ok(self.stored_price)
    }

    fn stored_adjustment(&self) -> Result<StoredAdjustment, ProtocolError> {
        Ok(self.adjustment)
    }

    fn underwater_since(&self) -> Result<Timestamp, ProtocolError> {
        Ok(self.underwater_since)
    }
}
