//! Discovery Publisher (C13): `/.well-known/openid-configuration` and
//! `/.well-known/jwks.json`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{HeaderValue, CACHE_CONTROL};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn openid_configuration(State(state): State<Arc<AppState>>) -> Response {
    let profile = state.profile_engine.current();
    let document = auth_oauth::build_discovery_document(&profile);

    let mut response = Json(document).into_response();
    response.headers_mut().insert(
        CACHE_CONTROL,
        HeaderValue::from_str(&format!("public, max-age={}", auth_oauth::discovery::DISCOVERY_CACHE_SECONDS))
            .unwrap_or_else(|_| HeaderValue::from_static("no-cache")),
    );
    response
}

pub async fn jwks(State(state): State<Arc<AppState>>) -> Response {
    let keys = state.key_manager.all_public_jwks();
    Json(json!({ "keys": keys })).into_response()
}
