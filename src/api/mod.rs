//! Inbound HTTP API
//!
//! Thin layer over the services: query parsing, response envelopes, status
//! codes. Every payload carries `success`; provider failures surface as
//! HTTP 500 with `{success:false, error}`, except candles and trending,
//! which always answer 200 (synthesis guarantees data) and flag degraded
//! results via `isSynthetic`/`fallbackReason`.

use crate::intel::TokenIntelService;
use crate::market::orchestrator::DEFAULT_LIMIT;
use crate::market::trending::DEFAULT_TRENDING_LIMIT;
use crate::market::{MarketDataService, Timeframe, TrendingService};
use crate::rate_limiter::RateLimiter;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct AppState {
    pub market: MarketDataService,
    pub trending: TrendingService,
    pub intel: TokenIntelService,
    pub limiter: Arc<RateLimiter>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/price-data", get(price_data))
        .route("/trending", get(trending))
        .route("/token-security", get(token_security))
        .route("/holders", get(holders))
        .route("/transactions", get(transactions))
        .with_state(state)
}

fn bad_request(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": message })),
    )
}

fn internal_error(error: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": error.to_string() })),
    )
}

#[derive(Debug, Deserialize)]
struct PriceDataParams {
    address: String,
    timeframe: Option<String>,
    chain: Option<String>,
    before: Option<i64>,
    limit: Option<usize>,
}

async fn price_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PriceDataParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(chain) = &params.chain {
        if chain != "solana" {
            return Err(bad_request("unsupported chain"));
        }
    }

    let timeframe = match &params.timeframe {
        Some(raw) => Timeframe::parse(raw).ok_or_else(|| bad_request("invalid timeframe"))?,
        None => Timeframe::H1,
    };

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let series = state
        .market
        .get_market_data(&params.address, timeframe, params.before, limit)
        .await;
    let meta = state.market.token_meta(&params.address).await;

    Ok(Json(json!({
        "success": true,
        "data": series.candles,
        "hasOHLC": !series.is_synthetic,
        "isSynthetic": series.is_synthetic,
        "source": series.source,
        "fallbackReason": series.fallback_reason,
        "symbol": meta.as_ref().map(|m| m.symbol.clone()),
        "lastUpdate": series.last_update,
    })))
}

#[derive(Debug, Deserialize)]
struct TrendingParams {
    limit: Option<usize>,
}

async fn trending(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrendingParams>,
) -> Json<Value> {
    let list = state
        .trending
        .get_trending(params.limit.unwrap_or(DEFAULT_TRENDING_LIMIT))
        .await;

    Json(json!({
        "success": true,
        "data": list.tokens,
        "isSynthetic": list.is_synthetic,
        "source": list.source,
    }))
}

#[derive(Debug, Deserialize)]
struct AddressParams {
    address: String,
    limit: Option<usize>,
}

async fn token_security(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AddressParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let report = state
        .intel
        .token_security(&params.address)
        .await
        .map_err(internal_error)?;

    Ok(Json(json!({ "success": true, "data": report })))
}

async fn holders(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AddressParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let holders = state
        .intel
        .top_holders(&params.address, params.limit.unwrap_or(20))
        .await
        .map_err(internal_error)?;

    Ok(Json(json!({ "success": true, "data": holders })))
}

async fn transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AddressParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let transactions = state
        .intel
        .recent_transactions(&params.address, params.limit.unwrap_or(50))
        .await
        .map_err(internal_error)?;

    Ok(Json(json!({ "success": true, "data": transactions })))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let windows: Value = state
        .limiter
        .snapshot()
        .await
        .into_iter()
        .map(|(credential, count)| (credential, json!(count)))
        .collect::<serde_json::Map<String, Value>>()
        .into();

    Json(json!({ "status": "ok", "rateWindows": windows }))
}
