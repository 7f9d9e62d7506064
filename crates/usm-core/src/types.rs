//! Core type definitions for the USM engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unsigned 18-decimal fixed-point value (1.0 = `constants::WAD`)
pub type Wad = u128;

/// Signed 18-decimal fixed-point value, used only for the pool buffer
pub type SignedWad = i128;

/// Unix time in seconds
pub type Timestamp = u64;

/// Which way the user trades the reserve asset (ETH).
///
/// Mint and defund sell ETH exposure; burn and fund buy it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }

    /// The counterparty side
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Token issued by the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Stable token
    Usm,
    /// Leveraged reserve-share token
    Fum,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usm => "USM",
            Self::Fum => "FUM",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rounding direction for a fixed-point operation.
///
/// Amounts paid out by the protocol round down, amounts required in round up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    Up,
    Down,
}

impl Rounding {
    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }

    pub fn is_up(self) -> bool {
        matches!(self, Self::Up)
    }
}

/// Constants
pub mod constants {
    use super::{Timestamp, Wad};

    /// 1.0 in 18-decimal fixed point
    pub const WAD: Wad = 1_000_000_000_000_000_000;

    /// 0.5 in 18-decimal fixed point
    pub const HALF_WAD: Wad = WAD / 2;

    pub const SECONDS_PER_MINUTE: Timestamp = 60;
    pub const SECONDS_PER_DAY: Timestamp = 86_400;

    /// Debt ratio above which the system is underwater (80%)
    pub const DEFAULT_MAX_DEBT_RATIO: Wad = 800_000_000_000_000_000;

    /// Half-life of the underwater FUM buy-price supply decay
    pub const DEFAULT_MIN_FUM_BUY_PRICE_HALF_LIFE: Timestamp = SECONDS_PER_DAY;

    /// Half-life of the bid/ask adjustment decay toward 1.0
    pub const DEFAULT_BID_ASK_ADJUSTMENT_HALF_LIFE: Timestamp = SECONDS_PER_MINUTE;
}
