//! HTTP-boundary error envelope (§6, §7): every non-redirect failure
//! response is `{"error": "<code>", "error_description": "<text>"}`.
//! `auth-oauth`'s [`OAuthError`] already carries the wire `code()` and
//! `http_status()`; this type just renders it and folds in the handful of
//! failure modes that originate above that crate (malformed bodies,
//! gateway extractor rejections, unknown settings profiles).

use auth_gateway::GatewayError;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use config_engine::ConfigError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    OAuth(#[from] auth_oauth::OAuthError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("malformed request body: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, description) = match &self {
            ApiError::OAuth(err) => (
                StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::BAD_REQUEST),
                err.code(),
                err.to_string(),
            ),
            ApiError::Gateway(err) => (StatusCode::UNAUTHORIZED, "invalid_token", err.to_string()),
            ApiError::Config(err) => (StatusCode::BAD_REQUEST, "invalid_request", err.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg.clone()),
        };

        let mut body = json!({ "error": code, "error_description": description });
        if matches!(&self, ApiError::OAuth(err) if err.is_family_revoked()) {
            body["action"] = json!("family_revoked");
        }

        let mut response = (status, Json(body)).into_response();

        if code == "invalid_token" {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                HeaderValue::from_static(r#"Bearer error="invalid_token""#),
            );
        }

        response
    }
}
