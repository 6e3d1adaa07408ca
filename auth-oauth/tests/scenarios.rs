//! End-to-end walks of the §8 scenarios that span more than one component:
//! authorize a code, redeem it at the token endpoint, call userinfo with
//! the resulting access token, then replay the same code and confirm the
//! prior access token no longer works (S1 happy path, S2 code reuse).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use auth_oauth::{
    AuthorizationCodeStore, AuthorizeContext, AuthorizeOutcome, AuthorizeRequest, ClientAuthRequest,
    ClientJwksSource, ClientRecord, ClientRegistry, DPoPVerifier, ParStore, RevocationTable, SessionContext,
    SubjectType, TokenContext, TokenEndpointAuthMethod, TokenRequest,
};
use auth_oauth::userinfo::{verify as userinfo_verify, TokenScheme, UserInfoRequest};
use chrono::{Duration, Utc};
use config_engine::SettingsProfile;
use crypto::{KeyAlgorithm, KeyManager};

fn registered_client() -> ClientRecord {
    ClientRecord {
        client_id: "rp-1".to_string(),
        client_secret_hash: Some("s3cret".to_string()),
        redirect_uris: HashSet::from(["https://rp.example/cb".to_string()]),
        grant_types: HashSet::from(["authorization_code".to_string()]),
        response_types: HashSet::from(["code".to_string()]),
        scope: vec!["openid".to_string(), "profile".to_string()],
        token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretBasic,
        jwks: None::<ClientJwksSource>,
        subject_type: SubjectType::Public,
        sector_identifier_uri: None,
        application_type: "web".to_string(),
        require_pkce: true,
        allowed_signing_algs: HashSet::new(),
        is_confidential: true,
    }
}

struct Harness {
    profile: SettingsProfile,
    registry: ClientRegistry,
    par: ParStore,
    codes: AuthorizationCodeStore,
    keys: KeyManager,
    dpop: DPoPVerifier,
    rotator: auth_oauth::RefreshTokenRotator,
    revocation: RevocationTable,
}

impl Harness {
    fn new() -> Self {
        let registry = ClientRegistry::new("https://as.example/token");
        registry.register(registered_client());
        Self {
            profile: SettingsProfile::basic_op("https://as.example"),
            registry,
            par: ParStore::new(Duration::seconds(600)),
            codes: AuthorizationCodeStore::new(Duration::seconds(120)),
            keys: KeyManager::bootstrap(KeyAlgorithm::Es256, Duration::days(90), Duration::days(30)).unwrap(),
            dpop: DPoPVerifier::new(Duration::seconds(60), vec![KeyAlgorithm::Es256]),
            rotator: auth_oauth::RefreshTokenRotator::new(Arc::new(audit_engine::AuditSink::start())),
            revocation: RevocationTable::new(),
        }
    }

    fn authorize_ctx(&self) -> AuthorizeContext<'_> {
        AuthorizeContext {
            profile: &self.profile,
            client_registry: &self.registry,
            par_store: &self.par,
            code_store: &self.codes,
            key_manager: &self.keys,
            allow_localhost_redirect: false,
        }
    }

    fn token_ctx(&self) -> TokenContext<'_> {
        TokenContext {
            profile: &self.profile,
            client_registry: &self.registry,
            code_store: &self.codes,
            key_manager: &self.keys,
            dpop: &self.dpop,
            refresh_rotator: &self.rotator,
            revocation: &self.revocation,
        }
    }
}

fn code_verifier_pair() -> (String, String) {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use sha2::{Digest, Sha256};
    let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string();
    let digest = Sha256::digest(verifier.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(digest);
    (verifier, challenge)
}

fn extract_code(redirect_url: &str) -> String {
    let url = url::Url::parse(redirect_url).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.to_string())
        .expect("redirect is missing a code parameter")
}

#[tokio::test]
async fn s1_happy_path_authorize_then_redeem_then_userinfo() {
    let harness = Harness::new();
    let (verifier, challenge) = code_verifier_pair();

    let mut params = HashMap::new();
    params.insert("response_type".to_string(), "code".to_string());
    params.insert("client_id".to_string(), "rp-1".to_string());
    params.insert("redirect_uri".to_string(), "https://rp.example/cb".to_string());
    params.insert("scope".to_string(), "openid profile".to_string());
    params.insert("state".to_string(), "xyz".to_string());
    params.insert("code_challenge".to_string(), challenge);
    params.insert("code_challenge_method".to_string(), "S256".to_string());

    let authorize_request = AuthorizeRequest {
        params,
        dpop_header: None,
        dpop_http_method: "GET".to_string(),
        dpop_http_url: "https://as.example/authorize".to_string(),
        session: Some(SessionContext {
            sub: "user-1".to_string(),
            auth_time: Utc::now(),
            acr: None,
        }),
    };

    let redirect_url = match auth_oauth::authorize::handle(&harness.authorize_ctx(), authorize_request) {
        AuthorizeOutcome::Redirect(url) => url,
        other => panic!("expected a redirect carrying a code, got {other:?}"),
    };
    assert!(redirect_url.starts_with("https://rp.example/cb?"));
    assert!(redirect_url.contains("state=xyz"));
    let code = extract_code(&redirect_url);

    let token_request = TokenRequest {
        grant_type: "authorization_code".to_string(),
        code: Some(code),
        redirect_uri: Some("https://rp.example/cb".to_string()),
        code_verifier: Some(verifier),
        refresh_token: None,
        requested_scope: None,
        client_auth: ClientAuthRequest {
            basic_client_id: Some("rp-1".to_string()),
            basic_client_secret: Some("s3cret".to_string()),
            ..Default::default()
        },
        dpop_proof: None,
        http_method: "POST".to_string(),
        http_url: "https://as.example/token".to_string(),
    };

    let token_response = auth_oauth::token::handle(&harness.token_ctx(), token_request).await.unwrap();
    assert_eq!(token_response.token_type, "Bearer");
    assert_eq!(token_response.expires_in, 3600);
    assert!(token_response.id_token.is_some());
    assert_eq!(token_response.scope, "openid profile");

    let jwks = harness.keys.all_public_jwks();
    let allowed = [KeyAlgorithm::Es256];
    let userinfo_request = UserInfoRequest {
        scheme: TokenScheme::Bearer,
        token: &token_response.access_token,
        dpop_proof: None,
        http_method: "GET",
        http_url: "https://as.example/userinfo",
        requested_claims: None,
    };
    let claims = userinfo_verify(&userinfo_request, &jwks, &allowed, &harness.dpop, &harness.revocation).unwrap();
    assert_eq!(claims["sub"], "user-1");
}

#[tokio::test]
async fn s2_code_reuse_is_rejected_and_the_prior_access_token_is_revoked() {
    let harness = Harness::new();
    let (verifier, challenge) = code_verifier_pair();

    let mut params = HashMap::new();
    params.insert("response_type".to_string(), "code".to_string());
    params.insert("client_id".to_string(), "rp-1".to_string());
    params.insert("redirect_uri".to_string(), "https://rp.example/cb".to_string());
    params.insert("scope".to_string(), "openid profile".to_string());
    params.insert("code_challenge".to_string(), challenge);
    params.insert("code_challenge_method".to_string(), "S256".to_string());

    let authorize_request = AuthorizeRequest {
        params,
        dpop_header: None,
        dpop_http_method: "GET".to_string(),
        dpop_http_url: "https://as.example/authorize".to_string(),
        session: Some(SessionContext {
            sub: "user-1".to_string(),
            auth_time: Utc::now(),
            acr: None,
        }),
    };
    let redirect_url = match auth_oauth::authorize::handle(&harness.authorize_ctx(), authorize_request) {
        AuthorizeOutcome::Redirect(url) => url,
        other => panic!("expected a redirect carrying a code, got {other:?}"),
    };
    let code = extract_code(&redirect_url);

    let make_token_request = |code: String, verifier: String| TokenRequest {
        grant_type: "authorization_code".to_string(),
        code: Some(code),
        redirect_uri: Some("https://rp.example/cb".to_string()),
        code_verifier: Some(verifier),
        refresh_token: None,
        requested_scope: None,
        client_auth: ClientAuthRequest {
            basic_client_id: Some("rp-1".to_string()),
            basic_client_secret: Some("s3cret".to_string()),
            ..Default::default()
        },
        dpop_proof: None,
        http_method: "POST".to_string(),
        http_url: "https://as.example/token".to_string(),
    };

    let first = auth_oauth::token::handle(&harness.token_ctx(), make_token_request(code.clone(), verifier.clone()))
        .await
        .unwrap();

    let second = auth_oauth::token::handle(&harness.token_ctx(), make_token_request(code, verifier)).await;
    assert!(matches!(second, Err(auth_oauth::OAuthError::InvalidGrant(_))));

    let jwks = harness.keys.all_public_jwks();
    let allowed = [KeyAlgorithm::Es256];
    let userinfo_request = UserInfoRequest {
        scheme: TokenScheme::Bearer,
        token: &first.access_token,
        dpop_proof: None,
        http_method: "GET",
        http_url: "https://as.example/userinfo",
        requested_claims: None,
    };
    let outcome = userinfo_verify(&userinfo_request, &jwks, &allowed, &harness.dpop, &harness.revocation);
    assert!(matches!(outcome, Err(auth_oauth::OAuthError::InvalidToken)));
}
