//! Token introspection (RFC 7662 supplement, SPEC_FULL.md §4): `POST
//! /introspect`. Not part of the distilled spec's module list; added
//! because a resource server cannot otherwise tell a revoked or
//! superseded opaque-looking JWT from a live one.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn introspect(
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

    let Some(token) = params.get("token") else {
        return Ok(Json(json!({ "active": false })).into_response());
    };

    let jwks = state.key_manager.all_public_jwks();
    let allowed = AppState::all_signing_algs();
    let claims = jwks
        .iter()
        .find_map(|jwk| auth_oauth::jwt::verify(token, jwk, &allowed).ok());

    let Some(claims) = claims else {
        return Ok(Json(json!({ "active": false })).into_response());
    };

    Ok(Json(active_response(&state, &claims)).into_response())
}

fn active_response(state: &AppState, claims: &Value) -> Value {
    let jti = claims.get("jti").and_then(Value::as_str);
    let sub = claims.get("sub").and_then(Value::as_str);
    let client_id = claims.get("client_id").and_then(Value::as_str);
    let exp = claims.get("exp").and_then(Value::as_i64);

    if let Some(exp) = exp {
        if exp <= Utc::now().timestamp() {
            return json!({ "active": false });
        }
    }

    // A refresh token (carries `rtv`) is only active while its version
    // still matches the live family; an access token (no `rtv`) is only
    // active while its `jti` has not been explicitly revoked.
    let is_refresh = claims.get("rtv").is_some();
    let live = if is_refresh {
        match (sub, client_id, claims.get("rtv").and_then(Value::as_u64)) {
            (Some(sub), Some(client_id), Some(rtv)) => state
                .refresh_rotator
                .validate(sub, client_id)
                .map(|(valid, version, _, _)| valid && version == rtv)
                .unwrap_or(false),
            _ => false,
        }
    } else {
        jti.map(|jti| !state.revocation.is_revoked(jti)).unwrap_or(false)
    };

    if !live {
        return json!({ "active": false });
    }

    json!({
        "active": true,
        "scope": claims.get("scope"),
        "client_id": client_id,
        "sub": sub,
        "exp": exp,
        "iat": claims.get("iat"),
        "token_type": if is_refresh { "refresh_token" } else { "access_token" },
    })
}
