use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Failures extracting credentials from an HTTP request, before any of
/// `auth-oauth`'s protocol logic runs.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GatewayError {
    #[error("missing Authorization header")]
    MissingAuthorization,
    #[error("unsupported Authorization scheme")]
    UnsupportedScheme,
    #[error("malformed Authorization or DPoP header")]
    MalformedHeader,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({ "error": "invalid_token", "error_description": self.to_string() })),
        )
            .into_response()
    }
}
