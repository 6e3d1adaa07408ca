//! Axum extractors shared by every `idp-server` handler that needs to read
//! bearer/DPoP credentials or a DPoP proof off the raw HTTP request, so
//! that logic lives in exactly one place instead of being copy-pasted per
//! handler.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::GatewayError;

/// The `Authorization` header of a resource request, distinguishing the
/// `Bearer` and `DPoP` schemes (RFC 6750, RFC 9449 §7).
#[derive(Debug, Clone)]
pub enum AuthorizationToken {
    Bearer(String),
    DPoP(String),
}

impl<S> FromRequestParts<S> for AuthorizationToken
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(GatewayError::MissingAuthorization)?;

        if let Some(token) = header.strip_prefix("Bearer ") {
            return Ok(AuthorizationToken::Bearer(token.trim().to_string()));
        }
        if let Some(token) = header.strip_prefix("DPoP ") {
            return Ok(AuthorizationToken::DPoP(token.trim().to_string()));
        }
        Err(GatewayError::UnsupportedScheme)
    }
}

/// The `DPoP` request header, carrying the sender-constraining proof JWT
/// (RFC 9449 §4). Absent on ordinary Bearer-only requests.
#[derive(Debug, Clone)]
pub struct DPoPProofHeader(pub Option<String>);

impl<S> FromRequestParts<S> for DPoPProofHeader
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let proof = parts
            .headers
            .get("DPoP")
            .map(|v| v.to_str().map_err(|_| GatewayError::MalformedHeader))
            .transpose()?
            .map(str::to_string);
        Ok(DPoPProofHeader(proof))
    }
}

/// `client_id`/`client_secret` decoded from HTTP Basic auth (RFC 6749
/// §2.3.1), used by the token endpoint's `client_secret_basic` method.
#[derive(Debug, Clone)]
pub struct BasicClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl<S> FromRequestParts<S> for BasicClientCredentials
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(GatewayError::MissingAuthorization)?;

        let encoded = header.strip_prefix("Basic ").ok_or(GatewayError::UnsupportedScheme)?;
        let decoded = STANDARD.decode(encoded).map_err(|_| GatewayError::MalformedHeader)?;
        let decoded = String::from_utf8(decoded).map_err(|_| GatewayError::MalformedHeader)?;
        let (client_id, client_secret) = decoded.split_once(':').ok_or(GatewayError::MalformedHeader)?;

        Ok(BasicClientCredentials {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }
}
