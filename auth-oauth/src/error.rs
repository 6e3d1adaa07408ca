use thiserror::Error;

use crate::jwt::JwtError;

/// Error kinds from §7, independent of wire shape. Handlers in `idp-server`
/// map these to the `{error, error_description}` envelope or to a redirect,
/// per endpoint.
#[derive(Error, Debug)]
pub enum OAuthError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid client")]
    InvalidClient,

    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    #[error("unsupported grant type")]
    UnsupportedGrantType,

    #[error("unsupported response type")]
    UnsupportedResponseType,

    #[error("invalid scope")]
    InvalidScope,

    #[error("invalid token")]
    InvalidToken,

    #[error("invalid dpop proof")]
    InvalidDPoPProof,

    #[error("server error: {0}")]
    ServerError(String),
}

impl OAuthError {
    /// The stable `error` wire value (RFC 6749 §5.2 / RFC 9449 §7).
    pub fn code(&self) -> &'static str {
        match self {
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::InvalidClient => "invalid_client",
            OAuthError::InvalidGrant(_) => "invalid_grant",
            OAuthError::UnsupportedGrantType => "unsupported_grant_type",
            OAuthError::UnsupportedResponseType => "unsupported_response_type",
            OAuthError::InvalidScope => "invalid_scope",
            OAuthError::InvalidToken => "invalid_token",
            OAuthError::InvalidDPoPProof => "invalid_dpop_proof",
            OAuthError::ServerError(_) => "server_error",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            OAuthError::InvalidClient => 401,
            OAuthError::InvalidToken | OAuthError::InvalidDPoPProof => 401,
            OAuthError::ServerError(_) => 500,
            _ => 400,
        }
    }

    /// Theft detection (§4.11) surfaces as `invalid_grant` carrying this
    /// marker so the token endpoint can add `"action": "family_revoked"`.
    pub fn is_family_revoked(&self) -> bool {
        matches!(self, OAuthError::InvalidGrant(reason) if reason == "family_revoked")
    }
}

/// Cryptographic verification failures never leak which check failed
/// (§7): every [`JwtError`] collapses to the uniform `invalid_token`.
impl From<JwtError> for OAuthError {
    fn from(_: JwtError) -> Self {
        OAuthError::InvalidToken
    }
}

pub type Result<T> = std::result::Result<T, OAuthError>;
