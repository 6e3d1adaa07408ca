//! Token Endpoint (C10, §4.10): the `authorization_code` and `refresh_token`
//! grants. `client_credentials`/device/CIBA are out of scope (§4.10.3).

use std::sync::Arc;

use chrono::Utc;
use config_engine::SettingsProfile;
use crypto::KeyManager;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::client_registry::{ClientAuthRequest, ClientRegistry};
use crate::code_store::AuthorizationCodeStore;
use crate::dpop::DPoPVerifier;
use crate::error::{OAuthError, Result};
use crate::jwt;
use crate::models::CodeConsumeOutcome;
use crate::pkce::{self, PkceMethod};
use crate::refresh::RefreshTokenRotator;
use crate::revocation::RevocationTable;

pub struct TokenContext<'a> {
    pub profile: &'a SettingsProfile,
    pub client_registry: &'a ClientRegistry,
    pub code_store: &'a AuthorizationCodeStore,
    pub key_manager: &'a KeyManager,
    pub dpop: &'a DPoPVerifier,
    pub refresh_rotator: &'a RefreshTokenRotator,
    pub revocation: &'a RevocationTable,
}

/// The raw form-encoded request, transport-agnostic (§1 Non-goals: the HTTP
/// binary owns `application/x-www-form-urlencoded` decoding).
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub requested_scope: Option<String>,
    pub client_auth: ClientAuthRequest,
    pub dpop_proof: Option<String>,
    pub http_method: String,
    pub http_url: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub scope: String,
}

pub async fn handle(ctx: &TokenContext<'_>, request: TokenRequest) -> Result<TokenResponse> {
    match request.grant_type.as_str() {
        "authorization_code" => authorization_code_grant(ctx, request).await,
        "refresh_token" => refresh_token_grant(ctx, request).await,
        _ => Err(OAuthError::UnsupportedGrantType),
    }
}

async fn authorization_code_grant(ctx: &TokenContext<'_>, request: TokenRequest) -> Result<TokenResponse> {
    let code = request.code.as_deref().ok_or_else(|| OAuthError::InvalidRequest("missing code".to_string()))?;
    let redirect_uri = request
        .redirect_uri
        .as_deref()
        .ok_or_else(|| OAuthError::InvalidRequest("missing redirect_uri".to_string()))?;

    // Step 2/3: consume the code first so a reused code is detected (and its
    // prior token + refresh family torn down) even if client auth below
    // would also have failed — reuse is the more severe signal (§4.9).
    let record = match ctx.code_store.consume(code) {
        CodeConsumeOutcome::NotFound => return Err(OAuthError::InvalidGrant("unknown or expired code".to_string())),
        CodeConsumeOutcome::Reused { client_id, sub, issued_token_jti } => {
            if let Some(jti) = issued_token_jti {
                ctx.revocation.revoke(&jti, Utc::now() + chrono::Duration::hours(1));
            }
            ctx.refresh_rotator.revoke_family(&sub, &client_id, "authorization_code_reuse").await;
            return Err(OAuthError::InvalidGrant("code has already been redeemed".to_string()));
        }
        CodeConsumeOutcome::Fresh(record) => record,
    };

    // Step 1: authenticate the client (after consuming, so the code can
    // never be replayed against a different client's credentials either).
    let client = ctx.client_registry.load(&record.client_id).ok_or(OAuthError::InvalidClient)?;
    let auth = ctx.client_registry.authenticate(ctx.profile, &request.client_auth, &client)?;
    if auth.client_id != record.client_id {
        return Err(OAuthError::InvalidGrant("code was not issued to this client".to_string()));
    }

    if record.redirect_uri != redirect_uri {
        return Err(OAuthError::InvalidGrant("redirect_uri does not match the original request".to_string()));
    }
    if record.is_expired(ctx.profile.code_ttl) {
        return Err(OAuthError::InvalidGrant("code has expired".to_string()));
    }

    // Step 4: PKCE.
    if let Some(challenge) = &record.code_challenge {
        let verifier = request
            .code_verifier
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidRequest("missing code_verifier".to_string()))?;
        let method = record
            .code_challenge_method
            .as_deref()
            .and_then(PkceMethod::parse)
            .unwrap_or(PkceMethod::Plain);
        pkce::verify(challenge, method, verifier)?;
    }

    // Step 5: DPoP binding.
    let dpop_jkt = if let Some(expected_jkt) = &record.dpop_jkt {
        let proof = request
            .dpop_proof
            .as_deref()
            .ok_or(OAuthError::InvalidDPoPProof)?;
        let outcome = ctx.dpop.verify(proof, &request.http_method, &request.http_url, None)?;
        if &outcome.jkt != expected_jkt {
            return Err(OAuthError::InvalidDPoPProof);
        }
        Some(outcome.jkt)
    } else if ctx.profile.require_dpop {
        return Err(OAuthError::InvalidRequest("this deployment requires DPoP-bound authorization requests".to_string()));
    } else {
        None
    };

    let signing_key = ctx.key_manager.active_key().map_err(|e| OAuthError::ServerError(e.to_string()))?;
    let issuer = ctx.profile.issuer.trim_end_matches('/').to_string();
    let access_jti = Uuid::new_v4().to_string();
    let now = Utc::now();
    let access_exp = now + ctx.profile.access_token_ttl;

    // Step 6/7: access token.
    let mut access_claims = json!({
        "iss": issuer,
        "sub": record.sub,
        "aud": issuer,
        "scope": record.scope.join(" "),
        "client_id": record.client_id,
        "jti": access_jti,
        "iat": now.timestamp(),
        "exp": access_exp.timestamp(),
    });
    if let Some(jkt) = &dpop_jkt {
        access_claims["cnf"] = json!({ "jkt": jkt });
    }
    let access_token = jwt::sign(&access_claims, &signing_key).map_err(OAuthError::from)?;
    ctx.key_manager.note_signed(&signing_key.kid);
    ctx.code_store.record_issued_token(code, &access_jti);

    // Step 8: ID token.
    let at_hash = jwt::left_hash(access_token.as_bytes(), signing_key.alg);
    let mut id_claims = json!({
        "iss": issuer,
        "sub": record.sub,
        "aud": record.client_id,
        "exp": access_exp.timestamp(),
        "iat": now.timestamp(),
        "at_hash": at_hash,
    });
    if let Some(nonce) = &record.nonce {
        id_claims["nonce"] = json!(nonce);
    }
    if let Some(auth_time) = record.auth_time {
        id_claims["auth_time"] = json!(auth_time.timestamp());
    }
    if let Some(acr) = &record.acr {
        id_claims["acr"] = json!(acr);
    }
    let id_token = jwt::sign(&id_claims, &signing_key).map_err(OAuthError::from)?;
    ctx.key_manager.note_signed(&signing_key.kid);

    // Step 9: offline_access.
    let refresh_token = if record.scope.iter().any(|s| s == "offline_access") && client.grant_types.contains("refresh_token") {
        Some(mint_refresh_token(ctx, &signing_key, &issuer, &record.sub, &record.client_id, record.scope.clone())?)
    } else {
        None
    };

    Ok(TokenResponse {
        access_token,
        token_type: if dpop_jkt.is_some() { "DPoP" } else { "Bearer" },
        expires_in: ctx.profile.access_token_ttl.num_seconds(),
        id_token: Some(id_token),
        refresh_token,
        scope: record.scope.join(" "),
    })
}

async fn refresh_token_grant(ctx: &TokenContext<'_>, request: TokenRequest) -> Result<TokenResponse> {
    let presented = request
        .refresh_token
        .as_deref()
        .ok_or_else(|| OAuthError::InvalidRequest("missing refresh_token".to_string()))?;

    let jwks = ctx.key_manager.all_public_jwks();
    let allowed = [
        crypto::KeyAlgorithm::Rs256,
        crypto::KeyAlgorithm::Es256,
        crypto::KeyAlgorithm::Rs384,
        crypto::KeyAlgorithm::Es384,
        crypto::KeyAlgorithm::Rs512,
        crypto::KeyAlgorithm::Es512,
    ];
    let mut claims = None;
    for jwk in &jwks {
        if let Ok(decoded) = jwt::verify(presented, jwk, &allowed) {
            claims = Some(decoded);
            break;
        }
    }
    let claims = claims.ok_or(OAuthError::InvalidGrant("invalid refresh token".to_string()))?;

    let sub = claims.get("sub").and_then(|v| v.as_str()).ok_or(OAuthError::InvalidGrant("malformed refresh token".to_string()))?;
    let client_id = claims.get("client_id").and_then(|v| v.as_str()).ok_or(OAuthError::InvalidGrant("malformed refresh token".to_string()))?;
    let jti = claims.get("jti").and_then(|v| v.as_str()).ok_or(OAuthError::InvalidGrant("malformed refresh token".to_string()))?;
    let rtv = claims.get("rtv").and_then(|v| v.as_u64()).ok_or(OAuthError::InvalidGrant("malformed refresh token".to_string()))?;

    let client = ctx.client_registry.load(client_id).ok_or(OAuthError::InvalidClient)?;
    let auth = ctx.client_registry.authenticate(ctx.profile, &request.client_auth, &client)?;
    if auth.client_id != client_id {
        return Err(OAuthError::InvalidGrant("refresh token was not issued to this client".to_string()));
    }

    let requested_scope: Option<Vec<String>> = request
        .requested_scope
        .as_deref()
        .map(|s| s.split_whitespace().map(str::to_string).collect());

    use crate::models::RotationOutcome;
    let outcome = ctx
        .refresh_rotator
        .rotate(rtv, jti, sub, client_id, requested_scope.as_deref())
        .await;

    let (new_version, new_jti, expires_in, allowed_scope) = match outcome {
        RotationOutcome::Rotated { new_version, new_jti, expires_in, allowed_scope } => {
            (new_version, new_jti, expires_in, allowed_scope)
        }
        RotationOutcome::TheftDetected => {
            return Err(OAuthError::InvalidGrant("family_revoked".to_string()));
        }
        RotationOutcome::Expired | RotationOutcome::NotFound => {
            return Err(OAuthError::InvalidGrant("refresh token is no longer valid".to_string()));
        }
        RotationOutcome::ScopeAmplification => {
            return Err(OAuthError::InvalidScope);
        }
    };

    let effective_scope = requested_scope.unwrap_or(allowed_scope);

    let signing_key = ctx.key_manager.active_key().map_err(|e| OAuthError::ServerError(e.to_string()))?;
    let issuer = ctx.profile.issuer.trim_end_matches('/').to_string();
    let now = Utc::now();
    let access_exp = now + ctx.profile.access_token_ttl;
    let access_jti = Uuid::new_v4().to_string();

    let access_claims = json!({
        "iss": issuer,
        "sub": sub,
        "aud": issuer,
        "scope": effective_scope.join(" "),
        "client_id": client_id,
        "jti": access_jti,
        "iat": now.timestamp(),
        "exp": access_exp.timestamp(),
    });
    let access_token = jwt::sign(&access_claims, &signing_key).map_err(OAuthError::from)?;
    ctx.key_manager.note_signed(&signing_key.kid);

    let new_refresh_token = sign_refresh_token(&signing_key, &issuer, sub, client_id, new_version, &new_jti, &effective_scope, expires_in)
        .map_err(OAuthError::from)?;

    Ok(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: ctx.profile.access_token_ttl.num_seconds(),
        id_token: None,
        refresh_token: Some(new_refresh_token),
        scope: effective_scope.join(" "),
    })
}

/// Creates a fresh refresh family in C11 at `version=1` and mints its first
/// refresh-token JWT.
fn mint_refresh_token(
    ctx: &TokenContext<'_>,
    signing_key: &crypto::SigningKey,
    issuer: &str,
    sub: &str,
    client_id: &str,
    scope: Vec<String>,
) -> Result<String> {
    let (version, jti) = ctx.refresh_rotator.create(sub, client_id, scope.clone(), ctx.profile.refresh_token_ttl);
    sign_refresh_token(signing_key, issuer, sub, client_id, version, &jti, &scope, ctx.profile.refresh_token_ttl).map_err(OAuthError::from)
}

fn sign_refresh_token(
    signing_key: &crypto::SigningKey,
    issuer: &str,
    sub: &str,
    client_id: &str,
    version: u64,
    jti: &str,
    scope: &[String],
    ttl: chrono::Duration,
) -> jwt::JwtResult<String> {
    let now = Utc::now();
    let claims = json!({
        "iss": issuer,
        "sub": sub,
        "aud": issuer,
        "client_id": client_id,
        "rtv": version,
        "jti": jti,
        "scope": scope.join(" "),
        "iat": now.timestamp(),
        "exp": (now + ttl).timestamp(),
    });
    jwt::sign(&claims, signing_key)
}

/// Shared handle type used by the HTTP binary.
pub type SharedRefreshTokenRotator = Arc<RefreshTokenRotator>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_registry::ClientRegistry;
    use crate::models::{AuthorizationCode, ClientRecord, SubjectType, TokenEndpointAuthMethod};
    use audit_engine::AuditSink;
    use chrono::Duration;
    use std::collections::HashSet;

    fn profile() -> SettingsProfile {
        SettingsProfile::basic_op("https://as.example")
    }

    fn client(require_pkce: bool) -> ClientRecord {
        ClientRecord {
            client_id: "client-1".to_string(),
            client_secret_hash: Some("secret".to_string()),
            redirect_uris: HashSet::from(["https://rp.example/cb".to_string()]),
            grant_types: HashSet::from(["authorization_code".to_string(), "refresh_token".to_string()]),
            response_types: HashSet::from(["code".to_string()]),
            scope: vec!["openid".to_string(), "offline_access".to_string()],
            token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretBasic,
            jwks: None,
            subject_type: SubjectType::Public,
            sector_identifier_uri: None,
            application_type: "web".to_string(),
            require_pkce,
            allowed_signing_algs: HashSet::new(),
            is_confidential: true,
        }
    }

    fn auth_req() -> ClientAuthRequest {
        ClientAuthRequest {
            basic_client_id: Some("client-1".to_string()),
            basic_client_secret: Some("secret".to_string()),
            ..Default::default()
        }
    }

    fn code_record(offline_access: bool) -> AuthorizationCode {
        let mut scope = vec!["openid".to_string()];
        if offline_access {
            scope.push("offline_access".to_string());
        }
        AuthorizationCode {
            code: "code-1".to_string(),
            client_id: "client-1".to_string(),
            redirect_uri: "https://rp.example/cb".to_string(),
            scope,
            sub: "user-1".to_string(),
            nonce: Some("nonce-1".to_string()),
            code_challenge: None,
            code_challenge_method: None,
            claims_json: None,
            dpop_jkt: None,
            acr: None,
            auth_time: Some(Utc::now()),
            created_at: Utc::now(),
            used: false,
            issued_token_jti: None,
        }
    }

    fn context<'a>(
        profile: &'a SettingsProfile,
        registry: &'a ClientRegistry,
        codes: &'a AuthorizationCodeStore,
        keys: &'a KeyManager,
        dpop: &'a DPoPVerifier,
        rotator: &'a RefreshTokenRotator,
        revocation: &'a RevocationTable,
    ) -> TokenContext<'a> {
        TokenContext {
            profile,
            client_registry: registry,
            code_store: codes,
            key_manager: keys,
            dpop,
            refresh_rotator: rotator,
            revocation,
        }
    }

    #[tokio::test]
    async fn authorization_code_grant_issues_access_and_id_tokens() {
        let profile = profile();
        let registry = ClientRegistry::new("https://as.example/token");
        registry.register(client(false));
        let codes = AuthorizationCodeStore::new(Duration::seconds(120));
        codes.put(code_record(false));
        let keys = KeyManager::bootstrap(crypto::KeyAlgorithm::Es256, Duration::days(90), Duration::days(30)).unwrap();
        let dpop = DPoPVerifier::new(Duration::seconds(60), vec![crypto::KeyAlgorithm::Es256]);
        let rotator = RefreshTokenRotator::new(Arc::new(AuditSink::start()));
        let revocation = RevocationTable::new();
        let ctx = context(&profile, &registry, &codes, &keys, &dpop, &rotator, &revocation);

        let request = TokenRequest {
            grant_type: "authorization_code".to_string(),
            code: Some("code-1".to_string()),
            redirect_uri: Some("https://rp.example/cb".to_string()),
            code_verifier: None,
            refresh_token: None,
            requested_scope: None,
            client_auth: auth_req(),
            dpop_proof: None,
            http_method: "POST".to_string(),
            http_url: "https://as.example/token".to_string(),
        };

        let response = handle(&ctx, request).await.unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert!(response.id_token.is_some());
        assert!(response.refresh_token.is_none());
    }

    #[tokio::test]
    async fn offline_access_scope_mints_a_refresh_token() {
        let profile = profile();
        let registry = ClientRegistry::new("https://as.example/token");
        registry.register(client(false));
        let codes = AuthorizationCodeStore::new(Duration::seconds(120));
        codes.put(code_record(true));
        let keys = KeyManager::bootstrap(crypto::KeyAlgorithm::Es256, Duration::days(90), Duration::days(30)).unwrap();
        let dpop = DPoPVerifier::new(Duration::seconds(60), vec![crypto::KeyAlgorithm::Es256]);
        let rotator = RefreshTokenRotator::new(Arc::new(AuditSink::start()));
        let revocation = RevocationTable::new();
        let ctx = context(&profile, &registry, &codes, &keys, &dpop, &rotator, &revocation);

        let request = TokenRequest {
            grant_type: "authorization_code".to_string(),
            code: Some("code-1".to_string()),
            redirect_uri: Some("https://rp.example/cb".to_string()),
            code_verifier: None,
            refresh_token: None,
            requested_scope: None,
            client_auth: auth_req(),
            dpop_proof: None,
            http_method: "POST".to_string(),
            http_url: "https://as.example/token".to_string(),
        };

        let response = handle(&ctx, request).await.unwrap();
        assert!(response.refresh_token.is_some());
    }

    #[tokio::test]
    async fn reused_code_is_rejected_and_revokes_the_prior_token() {
        let profile = profile();
        let registry = ClientRegistry::new("https://as.example/token");
        registry.register(client(false));
        let codes = AuthorizationCodeStore::new(Duration::seconds(120));
        codes.put(code_record(false));
        let keys = KeyManager::bootstrap(crypto::KeyAlgorithm::Es256, Duration::days(90), Duration::days(30)).unwrap();
        let dpop = DPoPVerifier::new(Duration::seconds(60), vec![crypto::KeyAlgorithm::Es256]);
        let rotator = RefreshTokenRotator::new(Arc::new(AuditSink::start()));
        let revocation = RevocationTable::new();
        let ctx = context(&profile, &registry, &codes, &keys, &dpop, &rotator, &revocation);

        let make_request = || TokenRequest {
            grant_type: "authorization_code".to_string(),
            code: Some("code-1".to_string()),
            redirect_uri: Some("https://rp.example/cb".to_string()),
            code_verifier: None,
            refresh_token: None,
            requested_scope: None,
            client_auth: auth_req(),
            dpop_proof: None,
            http_method: "POST".to_string(),
            http_url: "https://as.example/token".to_string(),
        };

        handle(&ctx, make_request()).await.unwrap();
        let second = handle(&ctx, make_request()).await;
        assert!(matches!(second, Err(OAuthError::InvalidGrant(_))));
    }

    #[tokio::test]
    async fn refresh_token_grant_rotates_and_mints_new_tokens() {
        let profile = profile();
        let registry = ClientRegistry::new("https://as.example/token");
        registry.register(client(false));
        let codes = AuthorizationCodeStore::new(Duration::seconds(120));
        let keys = KeyManager::bootstrap(crypto::KeyAlgorithm::Es256, Duration::days(90), Duration::days(30)).unwrap();
        let dpop = DPoPVerifier::new(Duration::seconds(60), vec![crypto::KeyAlgorithm::Es256]);
        let rotator = RefreshTokenRotator::new(Arc::new(AuditSink::start()));
        let revocation = RevocationTable::new();
        let ctx = context(&profile, &registry, &codes, &keys, &dpop, &rotator, &revocation);

        let signing_key = keys.active_key().unwrap();
        let refresh_token = mint_refresh_token(&ctx, &signing_key, "https://as.example", "user-1", "client-1", vec!["openid".to_string()]).unwrap();

        let request = TokenRequest {
            grant_type: "refresh_token".to_string(),
            code: None,
            redirect_uri: None,
            code_verifier: None,
            refresh_token: Some(refresh_token),
            requested_scope: None,
            client_auth: auth_req(),
            dpop_proof: None,
            http_method: "POST".to_string(),
            http_url: "https://as.example/token".to_string(),
        };

        let response = handle(&ctx, request).await.unwrap();
        assert!(response.refresh_token.is_some());
    }
}
