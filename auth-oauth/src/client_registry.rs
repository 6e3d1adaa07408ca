//! Client Registry (C5): registered-client storage and token-request
//! authentication across the four supported auth methods.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use config_engine::ClientAuthMethod;
use crypto::constant_time::ct_eq_str;
use crypto::{Jwk, KeyAlgorithm};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::error::{OAuthError, Result};
use crate::jwt;
use crate::models::{ClientJwksSource, ClientRecord, TokenEndpointAuthMethod};

/// Replay window for `private_key_jwt`/`client_secret_jwt` assertions.
/// §4.5 mentions "short replay cache" without a number; SPEC_FULL.md fixes
/// it at 300s, the same order of magnitude as PAR/DPoP (see DESIGN.md).
pub const CLIENT_ASSERTION_REPLAY_WINDOW_SECONDS: i64 = 300;

/// Credentials a caller presents at the token endpoint, collected from the
/// `Authorization` header (Basic) and/or form body — transport-agnostic so
/// this crate never depends on `axum`.
#[derive(Debug, Clone, Default)]
pub struct ClientAuthRequest {
    pub basic_client_id: Option<String>,
    pub basic_client_secret: Option<String>,
    pub form_client_id: Option<String>,
    pub form_client_secret: Option<String>,
    pub client_assertion_type: Option<String>,
    pub client_assertion: Option<String>,
}

impl ClientAuthRequest {
    fn claimed_client_id(&self) -> Option<&str> {
        self.basic_client_id
            .as_deref()
            .or(self.form_client_id.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub client_id: String,
}

struct AssertionReplayCache {
    seen: HashMap<(String, String), chrono::DateTime<Utc>>,
}

impl AssertionReplayCache {
    fn new() -> Self {
        Self { seen: HashMap::new() }
    }

    fn check_and_insert(&mut self, client_id: &str, jti: &str) -> bool {
        let now = Utc::now();
        self.seen.retain(|_, exp| *exp > now);
        let key = (client_id.to_string(), jti.to_string());
        if self.seen.contains_key(&key) {
            return false;
        }
        self.seen.insert(
            key,
            now + Duration::seconds(CLIENT_ASSERTION_REPLAY_WINDOW_SECONDS),
        );
        true
    }
}

/// In-memory registered-client store. Registration (`/register`, RFC 7591)
/// and any persistence layer live outside this core (§1 Non-goals); this
/// type is the read path the token and authorization endpoints consult.
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, ClientRecord>>,
    assertion_replay: Mutex<AssertionReplayCache>,
    token_endpoint_url: String,
}

impl ClientRegistry {
    pub fn new(token_endpoint_url: impl Into<String>) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            assertion_replay: Mutex::new(AssertionReplayCache::new()),
            token_endpoint_url: token_endpoint_url.into(),
        }
    }

    pub fn register(&self, record: ClientRecord) {
        self.clients.write().insert(record.client_id.clone(), record);
    }

    pub fn load(&self, client_id: &str) -> Option<ClientRecord> {
        self.clients.read().get(client_id).cloned()
    }

    /// Authenticates a token-endpoint request against `record`, per §4.5.
    /// `profile.token_endpoint_auth_methods` is consulted first — a method
    /// the active deployment profile does not allow (e.g. `none` under
    /// `fapi-2`) is rejected before any credential is even inspected.
    /// Confidential-auth methods use constant-time secret comparison;
    /// `private_key_jwt` verifies the assertion against the client's own
    /// JWKS and enforces `iss=sub=client_id`, `aud=token_endpoint`, a
    /// future `exp`, and a per-client unseen `jti`.
    pub fn authenticate(
        &self,
        profile: &config_engine::SettingsProfile,
        request: &ClientAuthRequest,
        record: &ClientRecord,
    ) -> Result<AuthOutcome> {
        if !profile
            .token_endpoint_auth_methods
            .contains(&client_auth_method_as_profile(record.token_endpoint_auth_method))
        {
            return Err(OAuthError::InvalidClient);
        }
        match record.token_endpoint_auth_method {
            TokenEndpointAuthMethod::None => {
                if record.is_confidential {
                    return Err(OAuthError::InvalidClient);
                }
                let client_id = request.claimed_client_id().ok_or(OAuthError::InvalidClient)?;
                if client_id != record.client_id {
                    return Err(OAuthError::InvalidClient);
                }
                Ok(AuthOutcome { client_id: client_id.to_string() })
            }
            TokenEndpointAuthMethod::ClientSecretBasic => {
                let client_id = request.basic_client_id.as_deref().ok_or(OAuthError::InvalidClient)?;
                let secret = request.basic_client_secret.as_deref().ok_or(OAuthError::InvalidClient)?;
                self.verify_shared_secret(record, client_id, secret)
            }
            TokenEndpointAuthMethod::ClientSecretPost => {
                let client_id = request.form_client_id.as_deref().ok_or(OAuthError::InvalidClient)?;
                let secret = request.form_client_secret.as_deref().ok_or(OAuthError::InvalidClient)?;
                self.verify_shared_secret(record, client_id, secret)
            }
            TokenEndpointAuthMethod::PrivateKeyJwt | TokenEndpointAuthMethod::ClientSecretJwt => {
                self.verify_jwt_assertion(request, record)
            }
        }
    }

    fn verify_shared_secret(&self, record: &ClientRecord, client_id: &str, secret: &str) -> Result<AuthOutcome> {
        if client_id != record.client_id {
            return Err(OAuthError::InvalidClient);
        }
        let hash = record.client_secret_hash.as_deref().ok_or(OAuthError::InvalidClient)?;
        if !ct_eq_str(hash, secret) {
            return Err(OAuthError::InvalidClient);
        }
        Ok(AuthOutcome { client_id: client_id.to_string() })
    }

    fn verify_jwt_assertion(&self, request: &ClientAuthRequest, record: &ClientRecord) -> Result<AuthOutcome> {
        if request.client_assertion_type.as_deref()
            != Some("urn:ietf:params:oauth:client-assertion-type:jwt-bearer")
        {
            return Err(OAuthError::InvalidClient);
        }
        let assertion = request.client_assertion.as_deref().ok_or(OAuthError::InvalidClient)?;

        let jwks = self.client_jwks(record)?;
        let allowed = record
            .allowed_signing_algs
            .iter()
            .filter_map(|a| a.parse::<KeyAlgorithm>().ok())
            .collect::<Vec<_>>();

        let mut claims: Option<Value> = None;
        for jwk in &jwks {
            if let Ok(decoded) = jwt::verify(assertion, jwk, &allowed) {
                claims = Some(decoded);
                break;
            }
        }
        let claims = claims.ok_or(OAuthError::InvalidClient)?;

        let iss = claims.get("iss").and_then(Value::as_str).ok_or(OAuthError::InvalidClient)?;
        let sub = claims.get("sub").and_then(Value::as_str).ok_or(OAuthError::InvalidClient)?;
        if iss != record.client_id || sub != record.client_id {
            return Err(OAuthError::InvalidClient);
        }
        if !jwt::audience_contains(&claims, &self.token_endpoint_url) {
            return Err(OAuthError::InvalidClient);
        }
        let exp = claims.get("exp").and_then(Value::as_i64).ok_or(OAuthError::InvalidClient)?;
        if exp <= Utc::now().timestamp() {
            return Err(OAuthError::InvalidClient);
        }
        let jti = claims.get("jti").and_then(Value::as_str).ok_or(OAuthError::InvalidClient)?;
        if !self.assertion_replay.lock().check_and_insert(&record.client_id, jti) {
            return Err(OAuthError::InvalidClient);
        }

        Ok(AuthOutcome { client_id: record.client_id.clone() })
    }

    fn client_jwks(&self, record: &ClientRecord) -> Result<Vec<Jwk>> {
        match &record.jwks {
            Some(ClientJwksSource::Inline(jwks)) => Ok(jwks.clone()),
            // §4.5/§5: fetching `jwks_uri` is an I/O suspension point the
            // owning deployment performs and caches (§5 timeouts: "external
            // JWKS fetch <=2s with cache"); this core only consumes
            // pre-resolved inline JWKS, leaving the HTTP fetch + cache to
            // the binary that wires a `reqwest` client in.
            Some(ClientJwksSource::Uri(_)) => Err(OAuthError::ServerError(
                "jwks_uri resolution must be pre-populated by the caller".to_string(),
            )),
            None => Err(OAuthError::InvalidClient),
        }
    }
}

/// Maps a client's registered auth method onto the profile enum used to
/// express which methods a deployment allows, since the two live in
/// different crates (`auth-oauth` vs. `config-engine`) but name the same
/// five methods.
fn client_auth_method_as_profile(method: TokenEndpointAuthMethod) -> ClientAuthMethod {
    match method {
        TokenEndpointAuthMethod::None => ClientAuthMethod::None,
        TokenEndpointAuthMethod::ClientSecretBasic => ClientAuthMethod::ClientSecretBasic,
        TokenEndpointAuthMethod::ClientSecretPost => ClientAuthMethod::ClientSecretPost,
        TokenEndpointAuthMethod::ClientSecretJwt => ClientAuthMethod::ClientSecretJwt,
        TokenEndpointAuthMethod::PrivateKeyJwt => ClientAuthMethod::PrivateKeyJwt,
    }
}

/// Shared handle type used throughout the core.
pub type SharedClientRegistry = Arc<ClientRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubjectType;
    use std::collections::HashSet;

    fn basic_client() -> ClientRecord {
        ClientRecord {
            client_id: "client-1".to_string(),
            client_secret_hash: Some("s3cr3t".to_string()),
            redirect_uris: HashSet::from(["https://rp.example/cb".to_string()]),
            grant_types: HashSet::from(["authorization_code".to_string()]),
            response_types: HashSet::from(["code".to_string()]),
            scope: vec!["openid".to_string()],
            token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretBasic,
            jwks: None,
            subject_type: SubjectType::Public,
            sector_identifier_uri: None,
            application_type: "web".to_string(),
            require_pkce: true,
            allowed_signing_algs: HashSet::new(),
            is_confidential: true,
        }
    }

    #[test]
    fn client_secret_basic_succeeds_with_correct_secret() {
        let profile = config_engine::SettingsProfile::basic_op("https://as.example");
        let registry = ClientRegistry::new("https://as.example/token");
        registry.register(basic_client());
        let record = registry.load("client-1").unwrap();

        let req = ClientAuthRequest {
            basic_client_id: Some("client-1".to_string()),
            basic_client_secret: Some("s3cr3t".to_string()),
            ..Default::default()
        };
        assert!(registry.authenticate(&profile, &req, &record).is_ok());
    }

    #[test]
    fn client_secret_basic_rejects_wrong_secret() {
        let profile = config_engine::SettingsProfile::basic_op("https://as.example");
        let registry = ClientRegistry::new("https://as.example/token");
        registry.register(basic_client());
        let record = registry.load("client-1").unwrap();

        let req = ClientAuthRequest {
            basic_client_id: Some("client-1".to_string()),
            basic_client_secret: Some("wrong".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            registry.authenticate(&profile, &req, &record),
            Err(OAuthError::InvalidClient)
        ));
    }

    #[test]
    fn none_auth_method_rejects_confidential_client() {
        let profile = config_engine::SettingsProfile::basic_op("https://as.example");
        let registry = ClientRegistry::new("https://as.example/token");
        let mut record = basic_client();
        record.token_endpoint_auth_method = TokenEndpointAuthMethod::None;
        record.is_confidential = false;
        registry.register(record.clone());

        let req = ClientAuthRequest {
            form_client_id: Some("client-1".to_string()),
            ..Default::default()
        };
        assert!(registry.authenticate(&profile, &req, &record).is_ok());
    }

    #[test]
    fn auth_method_outside_profile_allow_list_is_rejected() {
        let profile = config_engine::SettingsProfile::fapi2("https://as.example");
        let registry = ClientRegistry::new("https://as.example/token");
        registry.register(basic_client());
        let record = registry.load("client-1").unwrap();

        let req = ClientAuthRequest {
            basic_client_id: Some("client-1".to_string()),
            basic_client_secret: Some("s3cr3t".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            registry.authenticate(&profile, &req, &record),
            Err(OAuthError::InvalidClient)
        ));
    }
}
