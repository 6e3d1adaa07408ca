//! Authorization Endpoint (C8): `GET`/`POST /authorize`.
//!
//! Session lookup is the one place this binary steps outside the
//! transport-agnostic core: a resource-owner session is read from the
//! `idp_session` cookie via `auth-identity` (C1 of that crate), and handed
//! to [`auth_oauth::authorize::handle`] as an already-authenticated
//! [`auth_oauth::SessionContext`]. Rendering an interactive login page for
//! `LoginRequired` is out of scope (§1 Non-goals); this binary instead
//! redirects to a configurable login surface with the original request
//! parameters preserved as a resumable query string.
use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::{COOKIE, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use auth_oauth::{AuthorizeContext, AuthorizeOutcome, AuthorizeRequest, SessionContext};

use crate::error::ApiError;
use crate::state::AppState;

const SESSION_COOKIE: &str = "idp_session";

async fn session_from_cookie(state: &AppState, headers: &HeaderMap) -> Option<SessionContext> {
    let cookie_header = headers.get(COOKIE)?.to_str().ok()?;
    let token = cookie_header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })?;
    let session = state.identity.validate_session(&token).await.ok()?;
    Some(SessionContext {
        sub: session.sub,
        auth_time: session.auth_time,
        acr: session.acr,
    })
}

pub async fn authorize(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let dpop_header = headers.get("DPoP").and_then(|v| v.to_str().ok()).map(str::to_string);
    let session = session_from_cookie(&state, &headers).await;

    let profile = state.profile_engine.current();
    let ctx = AuthorizeContext {
        profile: &profile,
        client_registry: &state.client_registry,
        par_store: &state.par_store,
        code_store: &state.code_store,
        key_manager: &state.key_manager,
        allow_localhost_redirect: state.config.allow_localhost_redirect,
    };

    let request = AuthorizeRequest {
        params,
        dpop_header,
        dpop_http_method: "GET".to_string(),
        dpop_http_url: format!("{}/authorize", profile.issuer),
        session,
    };

    match auth_oauth::authorize::handle(&ctx, request) {
        AuthorizeOutcome::Redirect(location) => Ok((
            StatusCode::FOUND,
            [(LOCATION, location)],
        )
            .into_response()),
        AuthorizeOutcome::DirectError(err) => Err(ApiError::from(err)),
        AuthorizeOutcome::LoginRequired { resume_params } => {
            let query = resume_params
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            Ok((
                StatusCode::FOUND,
                [(LOCATION, format!("/login?{query}"))],
            )
                .into_response())
        }
    }
}
