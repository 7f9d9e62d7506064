//! USM Engine Constants
//!
//! Fixed-point precision parameters. Tunable protocol parameters live in
//! `usm_core::EngineConfig`.

use usm_core::constants::WAD;
use usm_core::Wad;

/// Bid/ask adjustment at rest
pub const NEUTRAL_ADJUSTMENT: Wad = WAD;

/// Smallest adjustment the engine will persist (the multiplier must stay positive)
pub const MIN_ADJUSTMENT: Wad = 1;

/// Binary digits of a fractional exponent consumed by `decay::half_pow`
pub const FRACTION_BITS: u32 = 60;

/// Whole half-lives after which a decay factor is exactly zero
pub const MAX_WHOLE_HALF_LIVES: u128 = 128;

/// ln(2) in 18-decimal fixed point, rounded down
pub const LN_2: Wad = 693_147_180_559_945_309;

/// Debt ratio at which the buffer is exactly zero
pub const FULL_DEBT_RATIO: Wad = WAD;
