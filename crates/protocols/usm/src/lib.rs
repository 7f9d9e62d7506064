//! USM Pricing & Solvency Engine
//!
//! Pricing core for a collateralized stablecoin (USM) backed by a reserve
//! asset (ETH), with a leveraged share token (FUM) absorbing price risk.
//!
//! # Components
//!
//! - State loading from oracle, ledger, and persisted-state collaborators
//! - Debt ratio, buffer, and the underwater state machine
//! - Time-decaying bid/ask adjustment
//! - Mint, burn, fund, and defund conversions
//!
//! All pricing is pure, synchronous, 18-decimal fixed point with explicit
//! rounding. No floating point.
//!
//! # Example
//!
//! ```ignore
//! use usm::{load_state, usm_from_mint, MemoryMarket};
//!
//! let snapshot = load_state(&market, &market, &market, now)?;
//! let outcome = usm_from_mint(&config, &snapshot.state, eth_in)?;
//! println!("USM out: {}", outcome.amount_out);
//! ```

pub mod calculator;
pub mod constants;
pub mod decay;
pub mod fetch;
pub mod memory;
pub mod solvency;
pub mod spread;
pub mod state;
pub mod wad;

pub use calculator::*;
pub use constants::*;
pub use fetch::{
    check_for_fresh_oracle_price, load_fresh_state, load_state, PersistedState, PriceOracle,
    StoredAdjustment, TokenLedger,
};
pub use memory::MemoryMarket;
pub use solvency::*;
pub use spread::*;
pub use state::*;
