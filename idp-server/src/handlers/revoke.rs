//! Token revocation (RFC 7009 supplement, SPEC_FULL.md §4): `POST /revoke`.
//! Always answers `200` regardless of whether `token` was valid, live, or
//! already gone (RFC 7009 §2.2: "the authorization server responds with
//! HTTP status code 200 if the token has been revoked successfully or if
//! the client submitted an invalid token").

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Form;
use chrono::Utc;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn revoke(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let client_auth = super::token::client_auth_from(&headers, &params);
    let caller_client_id = params
        .get("client_id")
        .cloned()
        .or_else(|| client_auth.basic_client_id.clone())
        .ok_or_else(|| ApiError::BadRequest("missing client_id".to_string()))?;
    let caller = state
        .client_registry
        .load(&caller_client_id)
        .ok_or(auth_oauth::OAuthError::InvalidClient)?;
    let profile = state.profile_engine.current();
    state.client_registry.authenticate(&profile, &client_auth, &caller)?;

    if let Some(token) = params.get("token") {
        let jwks = state.key_manager.all_public_jwks();
        let allowed = AppState::all_signing_algs();
        if let Some(claims) = jwks.iter().find_map(|jwk| auth_oauth::jwt::verify(token, jwk, &allowed).ok()) {
            revoke_claims(&state, &claims, &caller_client_id).await;
        }
    }

    Ok(StatusCode::OK.into_response())
}

async fn revoke_claims(state: &AppState, claims: &Value, caller_client_id: &str) {
    let client_id = claims.get("client_id").and_then(Value::as_str).unwrap_or(caller_client_id);
    if client_id != caller_client_id {
        return;
    }

    if claims.get("rtv").is_some() {
        if let Some(sub) = claims.get("sub").and_then(Value::as_str) {
            state.refresh_rotator.revoke_family(sub, client_id, "client_requested_revocation").await;
        }
        return;
    }

    if let Some(jti) = claims.get("jti").and_then(Value::as_str) {
        let expires_at = claims
            .get("exp")
            .and_then(Value::as_i64)
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(|| Utc::now() + chrono::Duration::hours(1));
        state.revocation.revoke(jti, expires_at);
    }
}
