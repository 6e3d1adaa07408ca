//! Liveness and metrics surfaces (ambient stack, not a numbered §4
//! component): `GET /health`, `GET /metrics`.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    Json(state.health.snapshot()).into_response()
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    state.metrics_handle.render().into_response()
}
