//! Application state shared across API handlers

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;
use usm::MemoryMarket;
use usm_core::{AppConfig, Timestamp};

/// Current wall-clock time in seconds
pub fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    market: RwLock<MemoryMarket>,
}

impl AppState {
    pub fn new(config: AppConfig, market: MemoryMarket) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                market: RwLock::new(market),
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Copy of the current market
    pub async fn market(&self) -> MemoryMarket {
        self.inner.market.read().await.clone()
    }

    /// Replace the market wholesale
    pub async fn set_market(&self, market: MemoryMarket) {
        let mut current = self.inner.market.write().await;
        *current = market;
        tracing::info!("Market replaced");
    }

    /// Run `f` with exclusive access to the market
    pub async fn with_market_mut<T>(&self, f: impl FnOnce(&mut MemoryMarket) -> T) -> T {
        let mut market = self.inner.market.write().await;
        f(&mut market)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default(), MemoryMarket::default())
    }
}
