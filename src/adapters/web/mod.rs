//! JSON API adapter.
//!
//! Exposes the backtest and forward-testing flows over HTTP. Every
//! response body is JSON; errors come back as `{ "error": message }`
//! with a status chosen from the error class.

mod error;
mod handlers;

pub use error::ApiError;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::ports::bar_port::BarSeriesPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::SignalStorePort;

pub struct AppState {
    pub bars: Arc<dyn BarSeriesPort + Send + Sync>,
    pub store: Arc<dyn SignalStorePort + Send + Sync>,
    pub config: Arc<dyn ConfigPort + Send + Sync>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/backtest", post(handlers::backtest))
        .route("/api/market/bars", post(handlers::market_bars))
        .route("/api/forward/run", get(handlers::forward_run))
        .route(
            "/api/forward/status",
            get(handlers::forward_status).post(handlers::forward_toggle),
        )
        .route("/api/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
