//! Pushed Authorization Request endpoint (C7, RFC 9126): `POST /as/par`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn par(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Form(mut params): Form<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let client_auth = super::token::client_auth_from(&headers, &params);
    params.remove("client_secret");
    params.remove("client_assertion");
    params.remove("client_assertion_type");

    let client_id = params
        .get("client_id")
        .cloned()
        .or_else(|| client_auth.basic_client_id.clone())
        .ok_or_else(|| ApiError::BadRequest("missing client_id".to_string()))?;

    let client = state
        .client_registry
        .load(&client_id)
        .ok_or(auth_oauth::OAuthError::InvalidClient)?;
    let profile = state.profile_engine.current();
    state.client_registry.authenticate(&profile, &client_auth, &client)?;

    params.insert("client_id".to_string(), client_id.clone());
    let request_uri = state.par_store.put(client_id, params);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "request_uri": request_uri,
            "expires_in": state.par_store.ttl_seconds(),
        })),
    )
        .into_response())
}
