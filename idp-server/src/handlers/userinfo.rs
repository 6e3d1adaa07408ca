//! UserInfo Verifier (C12): `GET`/`POST /userinfo`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use axum::Json;

use auth_gateway::{AuthorizationToken, DPoPProofHeader};
use auth_oauth::{TokenScheme, UserInfoRequest};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn userinfo(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    token: AuthorizationToken,
    DPoPProofHeader(dpop_proof): DPoPProofHeader,
) -> Result<Response, ApiError> {
    let profile = state.profile_engine.current();
    let http_url = format!("{}{}", profile.issuer.trim_end_matches('/'), uri.path());

    let (scheme, raw_token) = match &token {
        AuthorizationToken::Bearer(t) => (TokenScheme::Bearer, t.as_str()),
        AuthorizationToken::DPoP(t) => (TokenScheme::DPoP, t.as_str()),
    };

    let request = UserInfoRequest {
        scheme,
        token: raw_token,
        dpop_proof: dpop_proof.as_deref(),
        http_method: "GET",
        http_url: &http_url,
        requested_claims: None,
    };

    let jwks = state.key_manager.all_public_jwks();
    let allowed = AppState::all_signing_algs();
    let claims = auth_oauth::userinfo::verify(&request, &jwks, &allowed, &state.dpop, &state.revocation)?;

    Ok(Json(claims).into_response())
}
