//! HTTP request handlers for the JSON API.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::ports::bar_port::BarBatch;
use crate::runner::{self, BacktestRequest, BacktestResponse, MarketBarsRequest};

use super::{ApiError, AppState};

pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub async fn backtest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BacktestRequest>,
) -> Result<Json<BacktestResponse>, ApiError> {
    let response = runner::run_backtest(state.bars.as_ref(), request).await?;
    Ok(Json(response))
}

pub async fn market_bars(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MarketBarsRequest>,
) -> Result<Json<BarBatch>, ApiError> {
    let batch = runner::fetch_market_bars(state.bars.as_ref(), request).await?;
    Ok(Json(batch))
}

#[derive(Debug, Deserialize)]
pub struct ForwardRunParams {
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub strategy_id: Option<String>,
}

/// Triggers one sweep over every enabled forward config, or a single
/// strategy when `strategy_id` is given. Guarded by a shared secret so
/// only the scheduler (or an operator who knows it) can fire evaluations.
pub async fn forward_run(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ForwardRunParams>,
) -> Result<Json<Value>, ApiError> {
    let required = state.config.get_string("forward", "secret");
    let authorized = matches!(
        (&required, &params.secret),
        (Some(required), Some(given)) if !required.is_empty() && required == given
    );
    if !authorized {
        return Err(ApiError::unauthorized("Unauthorized"));
    }

    let now = chrono::Utc::now().timestamp_millis();
    let report = match params.strategy_id.as_deref() {
        Some(id) => {
            runner::run_forward_single(state.bars.as_ref(), state.store.as_ref(), id, now).await
        }
        None => runner::run_forward_sweep(state.bars.as_ref(), state.store.as_ref(), now).await?,
    };
    Ok(Json(report.to_json()))
}

#[derive(Debug, Deserialize)]
pub struct ForwardStatusParams {
    pub strategy_id: String,
}

pub async fn forward_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ForwardStatusParams>,
) -> Result<Json<Value>, ApiError> {
    let strategy = state.store.get_strategy(&params.strategy_id)?;
    let config = state.store.get_forward_config(&strategy.id)?;
    let latest = state.store.latest_signal(&strategy.id)?;

    Ok(Json(json!({
        "ok": true,
        "strategy_id": strategy.id,
        "forward": {
            "enabled": config.as_ref().map(|c| c.enabled).unwrap_or(false),
            "frequency_seconds": config.as_ref().map(|c| c.frequency_seconds).unwrap_or(300),
            "last_checked_at": config.as_ref().and_then(|c| c.last_checked_at),
            "last_error": config.as_ref().and_then(|c| c.last_error.clone()),
            "updated_at": config.as_ref().map(|c| c.updated_at),
        },
        "last_signal": latest.map(|s| json!({
            "t": s.t,
            "signal_type": s.signal_type.as_str(),
            "price": s.price,
            "created_at": s.created_at,
        })),
    })))
}

#[derive(Debug, Deserialize)]
pub struct ForwardToggleRequest {
    pub strategy_id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub frequency_seconds: Option<i64>,
}

pub async fn forward_toggle(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForwardToggleRequest>,
) -> Result<Json<Value>, ApiError> {
    let strategy = state.store.get_strategy(&request.strategy_id)?;
    let frequency = request.frequency_seconds.unwrap_or(300);

    state
        .store
        .upsert_forward_config(&strategy.id, request.enabled, frequency)?;

    Ok(Json(json!({
        "ok": true,
        "strategy_id": strategy.id,
        "enabled": request.enabled,
        "frequency_seconds": frequency,
    })))
}
