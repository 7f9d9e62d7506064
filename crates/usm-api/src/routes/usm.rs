//! USM protocol endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use usm::wad::{checked_add, checked_sub};
use usm::{
    check_if_underwater, debt_ratio, ensure_within_max_debt_ratio, eth_from_burn,
    eth_from_defund, fum_from_fund, load_fresh_state, summarize, usm_from_mint,
    ConversionOutcome, FreshPrice, MarketSnapshot, MemoryMarket,
};
use usm_core::{ProtocolError, Wad};

use crate::dto::{ApiError, MarketStateResponse, PreviewRequest, PreviewResponse};
use crate::state::unix_now;
use crate::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

/// A priced conversion plus the outcome of its post-trade guard
type Priced = Result<(ConversionOutcome, Result<(), ProtocolError>), ProtocolError>;

/// Create USM routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/state", get(get_state))
        .route("/price/refresh", post(refresh_price))
        .route("/market", put(put_market))
        .route("/mint/preview", post(mint_preview))
        .route("/burn/preview", post(burn_preview))
        .route("/fund/preview", post(fund_preview))
        .route("/defund/preview", post(defund_preview))
}

fn protocol_error(e: ProtocolError) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(ApiError::new(e.error_code(), e.to_string())),
    )
}

fn parse_amount(raw: &str) -> Result<Wad, (StatusCode, Json<ApiError>)> {
    let amount: Wad = raw.trim().parse().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::bad_request(format!(
                "Amount must be a non-negative integer, got '{}'",
                raw
            ))),
        )
    })?;
    if amount == 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::bad_request("Amount must be positive")),
        ));
    }
    Ok(amount)
}

/// Guard failures block execution; any other error is a failed request
fn blocked_reason(
    guard: Result<(), ProtocolError>,
) -> Result<Option<String>, (StatusCode, Json<ApiError>)> {
    match guard {
        Ok(()) => Ok(None),
        Err(ProtocolError::ActionNotAllowed { reason }) => Ok(Some(reason)),
        Err(e) => Err(protocol_error(e)),
    }
}

fn load_fresh(
    state: &AppState,
    market: &MemoryMarket,
) -> Result<(MarketSnapshot, FreshPrice), (StatusCode, Json<ApiError>)> {
    load_fresh_state(&state.config().engine, market, market, market, unix_now())
        .map_err(protocol_error)
}

fn state_response(
    state: &AppState,
    snapshot: &MarketSnapshot,
    fresh: &FreshPrice,
) -> Result<MarketStateResponse, (StatusCode, Json<ApiError>)> {
    let summary = summarize(&state.config().engine, snapshot).map_err(protocol_error)?;
    Ok(MarketStateResponse::new(snapshot, &summary, fresh.price_changed))
}

/// GET /usm/state - Market summary at the live oracle price
pub async fn get_state(State(state): State<AppState>) -> ApiResult<MarketStateResponse> {
    let market = state.market().await;
    let (snapshot, fresh) = load_fresh(&state, &market)?;
    Ok(Json(state_response(&state, &snapshot, &fresh)?))
}

/// POST /usm/price/refresh - Persist the live oracle price, rebased adjustment
/// and underwater state
pub async fn refresh_price(State(state): State<AppState>) -> ApiResult<MarketStateResponse> {
    let response = state
        .with_market_mut(|market| {
            let (mut snapshot, fresh) = load_fresh(&state, market)?;
            let current = &snapshot.state;
            let check = check_if_underwater(
                &state.config().engine,
                current.stable_supply,
                current.pool_balance,
                current.current_price,
                current.underwater_since,
                current.timestamp,
            )
            .map_err(protocol_error)?;

            market.record_fresh_price(&fresh, snapshot.state.timestamp);
            market.record_underwater(&check);
            snapshot.state.underwater_since = check.underwater_since;
            state_response(&state, &snapshot, &fresh)
        })
        .await?;
    Ok(Json(response))
}

/// PUT /usm/market - Replace the in-memory market
pub async fn put_market(
    State(state): State<AppState>,
    Json(market): Json<MemoryMarket>,
) -> ApiResult<MemoryMarket> {
    state.set_market(market.clone()).await;
    Ok(Json(market))
}

async fn preview(
    state: &AppState,
    request: &PreviewRequest,
    price: impl FnOnce(&AppState, &MarketSnapshot, Wad) -> Priced,
) -> ApiResult<PreviewResponse> {
    let amount = parse_amount(&request.amount)?;
    let market = state.market().await;
    let (snapshot, _) = load_fresh(state, &market)?;
    let (outcome, guard) = price(state, &snapshot, amount).map_err(protocol_error)?;
    Ok(Json(PreviewResponse::new(&outcome, blocked_reason(guard)?)))
}

/// POST /usm/mint/preview - ETH in, USM out
pub async fn mint_preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> ApiResult<PreviewResponse> {
    preview(&state, &request, |state, snapshot, eth_in| {
        let config = &state.config().engine;
        let current = &snapshot.state;
        let outcome = usm_from_mint(config, current, eth_in)?;
        let guard = ensure_within_max_debt_ratio(
            config,
            current.current_price,
            checked_add(current.pool_balance, eth_in, "mint_preview")?,
            checked_add(current.stable_supply, outcome.amount_out, "mint_preview")?,
        );
        Ok((outcome, guard))
    })
    .await
}

/// POST /usm/burn/preview - USM in, ETH out
pub async fn burn_preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> ApiResult<PreviewResponse> {
    preview(&state, &request, |state, snapshot, usm_in| {
        let outcome = eth_from_burn(&state.config().engine, &snapshot.state, usm_in)?;
        Ok((outcome, Ok(())))
    })
    .await
}

/// POST /usm/fund/preview - ETH in, FUM out
pub async fn fund_preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> ApiResult<PreviewResponse> {
    preview(&state, &request, |state, snapshot, eth_in| {
        let current = &snapshot.state;
        let ratio = debt_ratio(
            current.current_price,
            current.pool_balance,
            current.stable_supply,
        )?;
        let prefund = snapshot.fum_supply == 0;
        let outcome = fum_from_fund(
            &state.config().engine,
            current,
            snapshot.fum_supply,
            eth_in,
            ratio,
            prefund,
        )?;
        Ok((outcome, Ok(())))
    })
    .await
}

/// POST /usm/defund/preview - FUM in, ETH out
pub async fn defund_preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> ApiResult<PreviewResponse> {
    preview(&state, &request, |state, snapshot, fum_in| {
        let config = &state.config().engine;
        let current = &snapshot.state;
        let outcome = eth_from_defund(config, current, snapshot.fum_supply, fum_in)?;
        let guard = ensure_within_max_debt_ratio(
            config,
            current.current_price,
            checked_sub(current.pool_balance, outcome.amount_out, "defund_preview")?,
            current.stable_supply,
        );
        Ok((outcome, guard))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::create_router;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use usm::StoredAdjustment;
    use usm_core::constants::WAD;
    use usm_core::AppConfig;

    fn sample_market() -> MemoryMarket {
        MemoryMarket {
            reserve_balance: 50 * WAD,
            usm_supply: 30_000 * WAD,
            fum_supply: 20_000 * WAD,
            oracle_price: 1_000 * WAD,
            stored_price: 1_000 * WAD,
            adjustment: StoredAdjustment {
                value: WAD,
                timestamp: 0,
            },
            underwater_since: 0,
        }
    }

    fn app_with(market: MemoryMarket) -> (AppState, Router) {
        let state = AppState::new(AppConfig::default(), market);
        (state.clone(), create_router(state))
    }

    async fn send(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<String>,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(json) => request.body(Body::from(json)).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn amount_of(json: &serde_json::Value, field: &str) -> Wad {
        json[field].as_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn get_state_reports_summary() {
        let (_, app) = app_with(sample_market());
        let (status, json) = send(app, "GET", "/usm/state", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["debt_ratio"], "600000000000000000");
        assert_eq!(json["solvency"]["state"], "solvent");
        assert_eq!(json["price_changed"], false);
        assert_eq!(json["can_mint_usm"], true);
    }

    #[tokio::test]
    async fn get_state_without_oracle_is_unavailable() {
        let mut market = sample_market();
        market.oracle_price = 0;
        let (_, app) = app_with(market);
        let (status, json) = send(app, "GET", "/usm/state", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["code"], "state_unavailable");
    }

    #[tokio::test]
    async fn refresh_persists_new_price() {
        let mut market = sample_market();
        market.oracle_price = 1_100 * WAD;
        let (state, app) = app_with(market);
        let (status, json) = send(app, "POST", "/usm/price/refresh", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["price_changed"], true);
        assert_eq!(state.market().await.stored_price, 1_100 * WAD);
    }

    #[tokio::test]
    async fn refresh_persists_underwater_since() {
        let mut market = sample_market();
        // $500: 120% debt ratio
        market.oracle_price = 500 * WAD;
        let (state, app) = app_with(market);

        let (status, json) = send(app.clone(), "POST", "/usm/price/refresh", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["solvency"]["state"], "underwater");
        let since = json["solvency"]["since"].as_u64().unwrap();
        assert!(since > 0);
        assert_eq!(state.market().await.underwater_since, since);
        assert_eq!(amount_of(&json, "supply_for_fum_buys"), 20_000 * WAD);

        // Staying underwater keeps the original timestamp
        let (_, json) = send(app.clone(), "POST", "/usm/price/refresh", None).await;
        assert_eq!(json["solvency"]["since"].as_u64().unwrap(), since);
        assert_eq!(state.market().await.underwater_since, since);

        // Recovery clears it
        state.with_market_mut(|m| m.oracle_price = 1_000 * WAD).await;
        let (_, json) = send(app, "POST", "/usm/price/refresh", None).await;
        assert_eq!(json["solvency"]["state"], "solvent");
        assert_eq!(state.market().await.underwater_since, 0);
    }

    #[tokio::test]
    async fn mint_preview_happy_path() {
        let (_, app) = app_with(sample_market());
        let body = serde_json::json!({ "amount": WAD.to_string() }).to_string();
        let (status, json) = send(app, "POST", "/usm/mint/preview", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        let usm_out = amount_of(&json, "amount_out");
        assert!(usm_out > 990 * WAD && usm_out < 1_000 * WAD);
        assert!(amount_of(&json, "adjustment_factor") < WAD);
        assert_eq!(json["can_execute"], true);
        assert!(json["error"].is_null());
    }

    #[tokio::test]
    async fn mint_preview_blocked_at_max_debt_ratio() {
        let mut market = sample_market();
        market.usm_supply = 40_000 * WAD;
        let (_, app) = app_with(market);
        let body = serde_json::json!({ "amount": WAD.to_string() }).to_string();
        let (status, json) = send(app, "POST", "/usm/mint/preview", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["can_execute"], false);
        assert!(json["error"].as_str().unwrap().contains("debt ratio"));
    }

    #[tokio::test]
    async fn preview_rejects_bad_amount() {
        let (_, app) = app_with(sample_market());
        let body = serde_json::json!({ "amount": "1.5" }).to_string();
        let (status, json) = send(app.clone(), "POST", "/usm/burn/preview", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "bad_request");

        let body = serde_json::json!({ "amount": "0" }).to_string();
        let (status, _) = send(app, "POST", "/usm/burn/preview", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn burn_preview_exceeding_supply() {
        let (_, app) = app_with(sample_market());
        let body = serde_json::json!({ "amount": (30_001 * WAD).to_string() }).to_string();
        let (status, json) = send(app, "POST", "/usm/burn/preview", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "invalid_input");
    }

    #[tokio::test]
    async fn fund_preview_prefund_bootstrap() {
        let market = MemoryMarket {
            oracle_price: 1_000 * WAD,
            ..MemoryMarket::default()
        };
        let (_, app) = app_with(market);
        let body = serde_json::json!({ "amount": (10 * WAD).to_string() }).to_string();
        let (status, json) = send(app, "POST", "/usm/fund/preview", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["amount_out"], (10 * WAD).to_string());
        assert_eq!(json["adjustment_factor"], WAD.to_string());
    }

    #[tokio::test]
    async fn defund_preview_happy_path() {
        let (_, app) = app_with(sample_market());
        let body = serde_json::json!({ "amount": (2_000 * WAD).to_string() }).to_string();
        let (status, json) = send(app, "POST", "/usm/defund/preview", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        let eth_out = amount_of(&json, "amount_out");
        assert!(eth_out > WAD && eth_out < 2 * WAD);
        assert_eq!(json["can_execute"], true);
    }

    #[tokio::test]
    async fn put_market_replaces_state() {
        let (state, app) = app_with(MemoryMarket::default());
        let market = sample_market();
        let body = serde_json::to_string(&market).unwrap();
        let (status, _) = send(app, "PUT", "/usm/market", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.market().await, market);
    }
}
