//! Configuration types for the USM engine

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BID_ASK_ADJUSTMENT_HALF_LIFE, DEFAULT_MAX_DEBT_RATIO,
    DEFAULT_MIN_FUM_BUY_PRICE_HALF_LIFE, WAD,
};
use crate::{Error, Timestamp, Wad};

/// Pricing and solvency parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Debt ratio above which the system counts as underwater (18-decimal)
    #[serde(default = "default_max_debt_ratio")]
    pub max_debt_ratio: Wad,

    /// Half-life (seconds) of the underwater FUM buy-price supply decay
    #[serde(default = "default_min_fum_buy_price_half_life")]
    pub min_fum_buy_price_half_life: Timestamp,

    /// Half-life (seconds) of the bid/ask adjustment decay
    #[serde(default = "default_bid_ask_adjustment_half_life")]
    pub bid_ask_adjustment_half_life: Timestamp,
}

fn default_max_debt_ratio() -> Wad {
    DEFAULT_MAX_DEBT_RATIO
}

fn default_min_fum_buy_price_half_life() -> Timestamp {
    DEFAULT_MIN_FUM_BUY_PRICE_HALF_LIFE
}

fn default_bid_ask_adjustment_half_life() -> Timestamp {
    DEFAULT_BID_ASK_ADJUSTMENT_HALF_LIFE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_debt_ratio: default_max_debt_ratio(),
            min_fum_buy_price_half_life: default_min_fum_buy_price_half_life(),
            bid_ask_adjustment_half_life: default_bid_ask_adjustment_half_life(),
        }
    }
}

impl EngineConfig {
    /// Reject parameter sets the engine cannot price with
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_debt_ratio == 0 || self.max_debt_ratio > WAD {
            return Err(Error::Config(format!(
                "max_debt_ratio must be in (0, 1e18], got {}",
                self.max_debt_ratio
            )));
        }
        if self.min_fum_buy_price_half_life == 0 {
            return Err(Error::Config(
                "min_fum_buy_price_half_life must be positive".to_string(),
            ));
        }
        if self.bid_ask_adjustment_half_life == 0 {
            return Err(Error::Config(
                "bid_ask_adjustment_half_life must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Engine parameters
    #[serde(default)]
    pub engine: EngineConfig,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_api_port() -> u16 {
    19080
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            api_port: default_api_port(),
        }
    }
}

impl AppConfig {
    /// Parse and validate a JSON config document
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Read a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}
