//! Request handlers for the observability server.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use super::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.pool_alive.load(std::sync::atomic::Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

pub async fn version_check() -> impl IntoResponse {
    Json(serde_json::json!({ "version": VERSION }))
}

pub async fn metrics_text(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export_prometheus(),
    )
}

pub async fn debug_sources(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.scene.read().clone())
}
