//! Data model (§3): entities owned by each component. Types here carry no
//! behavior beyond small derived accessors; component modules own the
//! operations that create and mutate them.

use chrono::{DateTime, Utc};
use crypto::Jwk;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    ClientSecretBasic,
    ClientSecretPost,
    ClientSecretJwt,
    PrivateKeyJwt,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    Public,
    Pairwise,
}

/// Where a client's verification JWKS can be found. Exactly one variant is
/// populated (§3: "`jwks` XOR `jwks_uri`").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientJwksSource {
    Inline(Vec<Jwk>),
    Uri(String),
}

/// A registered relying party. Owned by the Client Registry (C5); read-mostly
/// once created by registration, which is out of scope of this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub client_id: String,
    pub client_secret_hash: Option<String>,
    pub redirect_uris: HashSet<String>,
    pub grant_types: HashSet<String>,
    pub response_types: HashSet<String>,
    pub scope: Vec<String>,
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,
    pub jwks: Option<ClientJwksSource>,
    pub subject_type: SubjectType,
    pub sector_identifier_uri: Option<String>,
    pub application_type: String,
    pub require_pkce: bool,
    pub allowed_signing_algs: HashSet<String>,
    pub is_confidential: bool,
}

impl ClientRecord {
    pub fn supports_redirect_uri(&self, candidate: &str, allow_localhost: bool) -> bool {
        if self.redirect_uris.contains(candidate) {
            return true;
        }
        allow_localhost && candidate.starts_with("http://localhost")
    }
}

/// One-shot authorization code (§3, §4.9). Owned by the code store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: Vec<String>,
    pub sub: String,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub claims_json: Option<serde_json::Value>,
    pub dpop_jkt: Option<String>,
    pub acr: Option<String>,
    pub auth_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub used: bool,
    pub issued_token_jti: Option<String>,
}

impl AuthorizationCode {
    pub fn is_expired(&self, ttl: chrono::Duration) -> bool {
        Utc::now() - self.created_at > ttl
    }
}

/// Pushed Authorization Request bundle (§3, §4.7). `params` carries the raw
/// authorization parameter set verbatim so the Authorization Endpoint can
/// overlay it unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PARRequest {
    pub request_uri: String,
    pub client_id: String,
    pub params: std::collections::HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl PARRequest {
    pub fn is_expired(&self, ttl: chrono::Duration) -> bool {
        Utc::now() - self.created_at > ttl
    }
}

/// Lineage of a refresh token across rotations (§3, §4.11). Keyed by
/// `(client_id, sub)` at the rotator boundary, not stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenFamily {
    pub client_id: String,
    pub sub: String,
    pub version: u64,
    pub last_jti: String,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub allowed_scope: Vec<String>,
    pub revoked: bool,
    pub revoked_reason: Option<String>,
}

impl TokenFamily {
    pub fn allowed_scope_set(&self) -> HashSet<&str> {
        self.allowed_scope.iter().map(String::as_str).collect()
    }
}

/// DPoP replay cache entry (§3, §4.4), keyed by JWK thumbprint + `jti`.
#[derive(Debug, Clone)]
pub struct DPoPNonceRecord {
    pub jti: String,
    pub sub_jkt: String,
    pub exp: DateTime<Utc>,
}

/// An access token `jti` that must be rejected even though its signature and
/// expiry are otherwise valid (post code-reuse revocation, explicit
/// `/revoke`).
#[derive(Debug, Clone)]
pub struct RevokedAccessToken {
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of `AuthorizationCodeStore::consume` (§4.9).
#[derive(Debug, Clone)]
pub enum CodeConsumeOutcome {
    Fresh(AuthorizationCode),
    /// Carries `client_id`/`sub` alongside `issued_token_jti` so a reuse can
    /// revoke the access token *and* tear down any refresh family the first
    /// (legitimate) exchange created from this code.
    Reused {
        client_id: String,
        sub: String,
        issued_token_jti: Option<String>,
    },
    NotFound,
}

/// Outcome of `RefreshTokenRotator::rotate` (§4.11).
#[derive(Debug, Clone)]
pub enum RotationOutcome {
    Rotated {
        new_version: u64,
        new_jti: String,
        expires_in: chrono::Duration,
        allowed_scope: Vec<String>,
    },
    TheftDetected,
    Expired,
    NotFound,
    ScopeAmplification,
}
