//! HTTP server setup

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::routes::create_router;
use crate::AppState;

/// Quote API router with CORS and request tracing
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serve on localhost at the configured port until `shutdown` resolves
pub async fn start_server(
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let config = state.config();
    let addr = SocketAddr::from(([127, 0, 0, 1], config.api_port));

    tracing::info!(
        max_debt_ratio = %config.engine.max_debt_ratio,
        fum_half_life = config.engine.min_fum_buy_price_half_life,
        adjustment_half_life = config.engine.bid_ask_adjustment_half_life,
        "Starting USM quote API on {}",
        addr
    );

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Quote API stopped");
    Ok(())
}
