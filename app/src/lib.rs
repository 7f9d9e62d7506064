//! USM quote service
//!
//! Loads configuration and an initial market, then serves the quote API.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use usm::MemoryMarket;
use usm_api::AppState;
use usm_core::AppConfig;

/// Initial market carried in the same config document as `AppConfig`
#[derive(Debug, Default, Deserialize)]
struct MarketSeed {
    #[serde(default)]
    market: MemoryMarket,
}

/// Parse a service config document: `AppConfig` fields plus an optional `market`
pub fn parse_service_config(json: &str) -> anyhow::Result<(AppConfig, MemoryMarket)> {
    let config = AppConfig::from_json_str(json)?;
    let seed: MarketSeed = serde_json::from_str(json).context("Invalid market section")?;
    Ok((config, seed.market))
}

fn load_service_config(path: Option<&Path>) -> anyhow::Result<(AppConfig, MemoryMarket)> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            parse_service_config(&json)
        }
        None => {
            tracing::warn!("No config file given, using defaults and an empty market");
            Ok((AppConfig::default(), MemoryMarket::default()))
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("usm=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .try_init()
        .map_err(|e| anyhow!(e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Run the quote service until interrupted
pub async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    init_tracing()?;

    tracing::info!("Starting USM engine");

    let (config, market) = load_service_config(config_path.as_deref())?;
    let state = AppState::new(config, market);

    usm_api::start_server(state, shutdown_signal())
        .await
        .context("Quote API failed")
}
