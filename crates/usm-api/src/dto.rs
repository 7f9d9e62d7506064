//! Data Transfer Objects for API requests and responses
//!
//! Amounts and prices travel as decimal strings of raw 18-decimal integers.

use serde::{Deserialize, Serialize};
use usm::{ConversionOutcome, MarketSnapshot, MarketSummary, SolvencyState};
use usm_core::Timestamp;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Generic API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }
}

/// Market state response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStateResponse {
    pub timestamp: Timestamp,
    pub current_price: String,
    pub oracle_price: String,
    /// True when the oracle moved away from the cached price
    pub price_changed: bool,
    pub pool_balance: String,
    pub usm_supply: String,
    pub fum_supply: String,
    pub debt_ratio: String,
    pub solvency: SolvencyState,
    pub eth_buffer: String,
    pub bid_ask_adjustment: String,
    /// ETH per USM
    pub usm_buy_price: String,
    pub usm_sell_price: String,
    /// USD per FUM
    pub fum_buy_price: String,
    pub fum_sell_price: String,
    pub supply_for_fum_buys: String,
    pub can_mint_usm: bool,
}

impl MarketStateResponse {
    pub fn new(snapshot: &MarketSnapshot, summary: &MarketSummary, price_changed: bool) -> Self {
        Self {
            timestamp: summary.timestamp,
            current_price: summary.current_price.to_string(),
            oracle_price: snapshot.state.oracle_price.to_string(),
            price_changed,
            pool_balance: snapshot.state.pool_balance.to_string(),
            usm_supply: snapshot.state.stable_supply.to_string(),
            fum_supply: snapshot.fum_supply.to_string(),
            debt_ratio: summary.debt_ratio.to_string(),
            solvency: summary.solvency,
            eth_buffer: summary.eth_buffer.to_string(),
            bid_ask_adjustment: summary.bid_ask_adjustment.to_string(),
            usm_buy_price: summary.usm_buy_price.to_string(),
            usm_sell_price: summary.usm_sell_price.to_string(),
            fum_buy_price: summary.fum_buy_price.to_string(),
            fum_sell_price: summary.fum_sell_price.to_string(),
            supply_for_fum_buys: summary.supply_for_fum_buys.to_string(),
            can_mint_usm: summary.can_mint_usm,
        }
    }
}

/// Preview request for any conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewRequest {
    /// Input amount (ETH for mint/fund, USM for burn, FUM for defund)
    pub amount: String,
}

/// Preview response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub amount_out: String,
    pub adjustment_factor: String,
    pub new_adjustment: String,
    pub can_execute: bool,
    pub error: Option<String>,
}

impl PreviewResponse {
    pub fn new(outcome: &ConversionOutcome, blocked: Option<String>) -> Self {
        Self {
            amount_out: outcome.amount_out.to_string(),
            adjustment_factor: outcome.adjustment_factor.to_string(),
            new_adjustment: outcome.new_adjustment.to_string(),
            can_execute: blocked.is_none(),
            error: blocked,
        }
    }
}
