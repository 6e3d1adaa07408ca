//! Token Endpoint (C10): `POST /token`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use auth_oauth::{ClientAuthRequest, TokenContext, TokenRequest};

use crate::error::ApiError;
use crate::state::AppState;

/// Collects client credentials from both the `Authorization: Basic` header
/// and the form body, since which one is populated depends on the
/// client's `token_endpoint_auth_method` (§4.5) and `ClientRegistry`
/// decides which half it actually needs.
pub(crate) fn client_auth_from(headers: &HeaderMap, params: &HashMap<String, String>) -> ClientAuthRequest {
    let (basic_client_id, basic_client_secret) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|header| header.strip_prefix("Basic "))
        .and_then(|encoded| STANDARD.decode(encoded).ok())
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .and_then(|decoded| decoded.split_once(':').map(|(a, b)| (a.to_string(), b.to_string())))
        .map(|(id, secret)| (Some(id), Some(secret)))
        .unwrap_or((None, None));

    ClientAuthRequest {
        basic_client_id,
        basic_client_secret,
        form_client_id: params.get("client_id").cloned(),
        form_client_secret: params.get("client_secret").cloned(),
        client_assertion_type: params.get("client_assertion_type").cloned(),
        client_assertion: params.get("client_assertion").cloned(),
    }
}

pub async fn token(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let client_auth = client_auth_from(&headers, &params);
    let dpop_proof = headers.get("DPoP").and_then(|v| v.to_str().ok()).map(str::to_string);

    let profile = state.profile_engine.current();
    let request = TokenRequest {
        grant_type: params.get("grant_type").cloned().unwrap_or_default(),
        code: params.get("code").cloned(),
        redirect_uri: params.get("redirect_uri").cloned(),
        code_verifier: params.get("code_verifier").cloned(),
        refresh_token: params.get("refresh_token").cloned(),
        requested_scope: params.get("scope").cloned(),
        client_auth,
        dpop_proof,
        http_method: "POST".to_string(),
        http_url: format!("{}{}", profile.issuer.trim_end_matches('/'), uri.path()),
    };

    let ctx = TokenContext {
        profile: &profile,
        client_registry: &state.client_registry,
        code_store: &state.code_store,
        key_manager: &state.key_manager,
        dpop: &state.dpop,
        refresh_rotator: &state.refresh_rotator,
        revocation: &state.revocation,
    };

    let response = auth_oauth::token::handle(&ctx, request).await?;
    Ok(Json(response).into_response())
}
