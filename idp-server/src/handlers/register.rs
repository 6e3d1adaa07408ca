//! Dynamic Client Registration (RFC 7591 supplement, SPEC_FULL.md §4):
//! `POST /register`. A minimal in-memory registrar — no registration
//! access tokens, no `PUT`/`DELETE` management endpoints — since the
//! Client Registry (C5) itself only ever needed a read path (§1
//! Non-goals: "registration and persistence are out of scope").

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use auth_oauth::{ClientJwksSource, ClientRecord, SubjectType, TokenEndpointAuthMethod};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub token_endpoint_auth_method: Option<String>,
    #[serde(default)]
    pub jwks: Option<Vec<crypto::Jwk>>,
    #[serde(default)]
    pub application_type: Option<String>,
    #[serde(default)]
    pub subject_type: Option<String>,
    #[serde(default)]
    pub require_pkce: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: String,
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn parse_auth_method(value: Option<&str>) -> TokenEndpointAuthMethod {
    match value {
        Some("client_secret_post") => TokenEndpointAuthMethod::ClientSecretPost,
        Some("client_secret_jwt") => TokenEndpointAuthMethod::ClientSecretJwt,
        Some("private_key_jwt") => TokenEndpointAuthMethod::PrivateKeyJwt,
        Some("none") => TokenEndpointAuthMethod::None,
        _ => TokenEndpointAuthMethod::ClientSecretBasic,
    }
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    if request.redirect_uris.is_empty() {
        return Err(ApiError::BadRequest("redirect_uris must not be empty".to_string()));
    }

    let auth_method = parse_auth_method(request.token_endpoint_auth_method.as_deref());
    let is_confidential = auth_method != TokenEndpointAuthMethod::None;

    let client_id = format!("client-{}", Uuid::new_v4());
    let client_secret = is_confidential.then(random_secret);

    let grant_types: HashSet<String> = if request.grant_types.is_empty() {
        HashSet::from(["authorization_code".to_string()])
    } else {
        request.grant_types.iter().cloned().collect()
    };
    let response_types: HashSet<String> = if request.response_types.is_empty() {
        HashSet::from(["code".to_string()])
    } else {
        request.response_types.iter().cloned().collect()
    };

    let record = ClientRecord {
        client_id: client_id.clone(),
        client_secret_hash: client_secret.clone(),
        redirect_uris: request.redirect_uris.iter().cloned().collect(),
        grant_types: grant_types.clone(),
        response_types: response_types.clone(),
        scope: request.scope.split_whitespace().map(str::to_string).collect(),
        token_endpoint_auth_method: auth_method,
        jwks: request.jwks.map(ClientJwksSource::Inline),
        subject_type: if request.subject_type.as_deref() == Some("pairwise") {
            SubjectType::Pairwise
        } else {
            SubjectType::Public
        },
        sector_identifier_uri: None,
        application_type: request.application_type.unwrap_or_else(|| "web".to_string()),
        require_pkce: request.require_pkce.unwrap_or(!is_confidential),
        allowed_signing_algs: HashSet::new(),
        is_confidential,
    };

    state.client_registry.register(record);

    let response = RegisterResponse {
        client_id,
        client_secret,
        redirect_uris: request.redirect_uris,
        grant_types: grant_types.into_iter().collect(),
        response_types: response_types.into_iter().collect(),
        token_endpoint_auth_method: auth_method_wire_value(auth_method),
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

fn auth_method_wire_value(method: TokenEndpointAuthMethod) -> String {
    match method {
        TokenEndpointAuthMethod::ClientSecretBasic => "client_secret_basic",
        TokenEndpointAuthMethod::ClientSecretPost => "client_secret_post",
        TokenEndpointAuthMethod::ClientSecretJwt => "client_secret_jwt",
        TokenEndpointAuthMethod::PrivateKeyJwt => "private_key_jwt",
        TokenEndpointAuthMethod::None => "none",
    }
    .to_string()
}
