//! Authorization Endpoint (C8): the exact parameter-validation and
//! code-minting sequence of §4.8.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use config_engine::SettingsProfile;
use crypto::KeyManager;
use serde_json::Value;
use url::Url;

use crate::client_registry::ClientRegistry;
use crate::code_store::{random_code, AuthorizationCodeStore};
use crate::error::OAuthError;
use crate::jwt;
use crate::models::AuthorizationCode;
use crate::par::ParStore;
use crate::pkce::PkceMethod;
use crate::request_object;

/// A caller-authenticated resource-owner session, handed in by whatever
/// interactive login surface fronts this core (§1 Non-goals; auth-identity
/// owns session lifecycle).
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub sub: String,
    pub auth_time: DateTime<Utc>,
    pub acr: Option<String>,
}

pub struct AuthorizeContext<'a> {
    pub profile: &'a SettingsProfile,
    pub client_registry: &'a ClientRegistry,
    pub par_store: &'a ParStore,
    pub code_store: &'a AuthorizationCodeStore,
    pub key_manager: &'a KeyManager,
    pub allow_localhost_redirect: bool,
}

pub struct AuthorizeRequest {
    pub params: HashMap<String, String>,
    pub dpop_header: Option<String>,
    pub dpop_http_method: String,
    pub dpop_http_url: String,
    pub session: Option<SessionContext>,
}

/// Terminal outcomes the HTTP layer renders. Everything from step 6
/// onward carries `error`/`error_description` as redirect query
/// parameters rather than a JSON body (§6, §7).
#[derive(Debug)]
pub enum AuthorizeOutcome {
    Redirect(String),
    DirectError(OAuthError),
    /// Session absent/unsatisfactory and interactive login is required;
    /// rendering a login UI is out of scope (§1).
    LoginRequired { resume_params: HashMap<String, String> },
}

const ALLOWED_PROMPTS: &[&str] = &["none", "login", "consent", "select_account"];

pub fn handle(ctx: &AuthorizeContext, mut request: AuthorizeRequest) -> AuthorizeOutcome {
    // Step 1: PAR overlay.
    let mut par_consumed = false;
    if let Some(request_uri) = request.params.get("request_uri").cloned() {
        match ctx.par_store.consume(&request_uri) {
            Ok(bundle) => {
                let claimed_client_id = request.params.get("client_id").cloned();
                if let Some(claimed) = claimed_client_id {
                    if claimed != bundle.client_id {
                        return AuthorizeOutcome::DirectError(OAuthError::InvalidRequest(
                            "client_id does not match the pushed request".to_string(),
                        ));
                    }
                }
                request.params = bundle.params;
                request.params.insert("client_id".to_string(), bundle.client_id);
                par_consumed = true;
            }
            Err(err) => return AuthorizeOutcome::DirectError(err),
        }
    } else if ctx.profile.require_par {
        return AuthorizeOutcome::DirectError(OAuthError::InvalidRequest(
            "this deployment requires Pushed Authorization Requests".to_string(),
        ));
    }

    // Step 2: Request Object (JAR) overlay.
    if let Some(request_jwt) = request.params.get("request").cloned() {
        let client_id = match request.params.get("client_id") {
            Some(id) => id.clone(),
            None => return AuthorizeOutcome::DirectError(OAuthError::InvalidRequest("missing client_id".to_string())),
        };
        let client = match ctx.client_registry.load(&client_id) {
            Some(c) => c,
            None => return AuthorizeOutcome::DirectError(OAuthError::InvalidClient),
        };
        match request_object::parse(&request_jwt, &client, ctx.profile.allow_none_algorithm) {
            Ok(overlay) => request_object::overlay_params(&mut request.params, overlay),
            Err(err) => return AuthorizeOutcome::DirectError(err),
        }
    }

    // Step 3: response_type.
    let response_type = match request.params.get("response_type") {
        Some(rt) => rt.as_str(),
        None => return AuthorizeOutcome::DirectError(OAuthError::InvalidRequest("missing response_type".to_string())),
    };
    if response_type != "code" {
        return AuthorizeOutcome::DirectError(OAuthError::UnsupportedResponseType);
    }

    // Step 4: client_id.
    let client_id = match request.params.get("client_id") {
        Some(id) => id.clone(),
        None => return AuthorizeOutcome::DirectError(OAuthError::InvalidRequest("missing client_id".to_string())),
    };
    let client = match ctx.client_registry.load(&client_id) {
        Some(c) => c,
        None => return AuthorizeOutcome::DirectError(OAuthError::InvalidClient),
    };
    if !client.response_types.contains(response_type) {
        return AuthorizeOutcome::DirectError(OAuthError::UnsupportedResponseType);
    }

    // Step 5: redirect_uri, validated before any redirect is attempted.
    let redirect_uri = match request.params.get("redirect_uri") {
        Some(uri) => uri.clone(),
        None => return AuthorizeOutcome::DirectError(OAuthError::InvalidRequest("missing redirect_uri".to_string())),
    };
    if !client.supports_redirect_uri(&redirect_uri, ctx.allow_localhost_redirect) {
        return AuthorizeOutcome::DirectError(OAuthError::InvalidRequest("redirect_uri is not registered".to_string()));
    }
    if Url::parse(&redirect_uri).is_err() {
        return AuthorizeOutcome::DirectError(OAuthError::InvalidRequest("redirect_uri is not a valid URL".to_string()));
    }

    // From here on, failures redirect with `error`/`error_description`/`state`.
    let state = request.params.get("state").cloned();
    let redirect_error = |error: OAuthError| -> AuthorizeOutcome {
        AuthorizeOutcome::Redirect(build_error_redirect(&redirect_uri, &error, state.as_deref()))
    };

    // Step 7: scope/state/nonce/claims/prompt/max_age/acr_values/id_token_hint.
    let scope: Vec<String> = request
        .params
        .get("scope")
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    if !scope.iter().any(|s| s == "openid") {
        return redirect_error(OAuthError::InvalidRequest("scope must include openid".to_string()));
    }

    let nonce = request.params.get("nonce").cloned();

    let claims_json: Option<Value> = match request.params.get("claims") {
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(obj)) => {
                let allowed_keys = obj.keys().all(|k| k == "userinfo" || k == "id_token");
                if !allowed_keys {
                    return redirect_error(OAuthError::InvalidRequest(
                        "claims must only contain userinfo/id_token sections".to_string(),
                    ));
                }
                Some(Value::Object(obj))
            }
            _ => return redirect_error(OAuthError::InvalidRequest("claims parameter must be a JSON object".to_string())),
        },
        None => None,
    };

    let prompt_tokens: Vec<&str> = request
        .params
        .get("prompt")
        .map(|p| p.split_whitespace().collect())
        .unwrap_or_default();
    if prompt_tokens.iter().any(|p| !ALLOWED_PROMPTS.contains(p)) {
        return redirect_error(OAuthError::InvalidRequest("unsupported prompt value".to_string()));
    }
    if prompt_tokens.contains(&"none") && prompt_tokens.len() > 1 {
        return redirect_error(OAuthError::InvalidRequest("prompt=none must be exclusive".to_string()));
    }

    let max_age: Option<i64> = match request.params.get("max_age") {
        Some(raw) => match raw.parse::<i64>() {
            Ok(v) if v >= 0 => Some(v),
            _ => return redirect_error(OAuthError::InvalidRequest("max_age must be a non-negative integer".to_string())),
        },
        None => None,
    };

    let acr_values = request.params.get("acr_values").cloned();

    let id_token_hint_claims: Option<Value> = match request.params.get("id_token_hint") {
        Some(hint) => {
            let jwks = ctx.key_manager.all_public_jwks();
            let mut verified = None;
            let allowed = [
                crypto::KeyAlgorithm::Rs256,
                crypto::KeyAlgorithm::Es256,
                crypto::KeyAlgorithm::Rs384,
                crypto::KeyAlgorithm::Es384,
                crypto::KeyAlgorithm::Rs512,
                crypto::KeyAlgorithm::Es512,
            ];
            for jwk in &jwks {
                if let Ok(claims) = jwt::verify(hint, jwk, &allowed) {
                    verified = Some(claims);
                    break;
                }
            }
            match verified {
                Some(claims) => Some(claims),
                None => return redirect_error(OAuthError::InvalidRequest("id_token_hint failed verification".to_string())),
            }
        }
        None => None,
    };

    // Step 8: PKCE.
    let code_challenge = request.params.get("code_challenge").cloned();
    let code_challenge_method_raw = request.params.get("code_challenge_method").cloned();
    if code_challenge.is_none() && client.require_pkce {
        return redirect_error(OAuthError::InvalidRequest("PKCE is required for this client".to_string()));
    }
    let code_challenge_method = match (&code_challenge, &code_challenge_method_raw) {
        (Some(_), Some(raw)) => match PkceMethod::parse(raw) {
            Some(PkceMethod::Plain) if ctx.profile.reject_plain_pkce => {
                return redirect_error(OAuthError::InvalidRequest("plain PKCE is not permitted by this profile".to_string()));
            }
            Some(method) => Some(method),
            None => return redirect_error(OAuthError::InvalidRequest("unsupported code_challenge_method".to_string())),
        },
        (Some(_), None) => Some(PkceMethod::Plain),
        (None, _) => None,
    };

    // Step 9: FAPI 2.0 additional requirements.
    if ctx.profile.require_confidential_clients && !client.is_confidential {
        return redirect_error(OAuthError::InvalidRequest("this profile requires confidential clients".to_string()));
    }
    if ctx.profile.name.starts_with("fapi-2") {
        if !par_consumed {
            return redirect_error(OAuthError::InvalidRequest("FAPI 2.0 requires PAR".to_string()));
        }
        if code_challenge_method != Some(PkceMethod::S256) {
            return redirect_error(OAuthError::InvalidRequest("FAPI 2.0 requires S256 PKCE".to_string()));
        }
    }

    // Step 10: silent-vs-interactive authentication decision.
    let effective_session = request.session.as_ref().filter(|session| {
        !prompt_tokens.contains(&"login") && session.satisfies_max_age(max_age)
    });

    let Some(session) = effective_session else {
        if prompt_tokens.contains(&"none") {
            return redirect_error(OAuthError::InvalidRequest("login_required".to_string()));
        }
        return AuthorizeOutcome::LoginRequired { resume_params: request.params.clone() };
    };

    // Step 11: mint the code.
    let dpop_jkt = request
        .dpop_header
        .as_deref()
        .and_then(|proof| extract_jkt_best_effort(proof));

    let code = AuthorizationCode {
        code: random_code(),
        client_id: client.client_id.clone(),
        redirect_uri: redirect_uri.clone(),
        scope,
        sub: session.sub.clone(),
        nonce,
        code_challenge,
        code_challenge_method: code_challenge_method.map(|m| match m {
            PkceMethod::S256 => "S256".to_string(),
            PkceMethod::Plain => "plain".to_string(),
        }),
        claims_json,
        dpop_jkt,
        acr: acr_values.or_else(|| id_token_hint_claims.as_ref().and_then(|c| c.get("acr").and_then(Value::as_str).map(str::to_string))).or(session.acr.clone()),
        auth_time: Some(session.auth_time),
        created_at: Utc::now(),
        used: false,
        issued_token_jti: None,
    };
    ctx.code_store.put(code.clone());

    // Step 12: redirect with the minted code.
    let mut url = match Url::parse(&redirect_uri) {
        Ok(url) => url,
        Err(_) => return AuthorizeOutcome::DirectError(OAuthError::ServerError("redirect_uri became invalid".to_string())),
    };
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("code", &code.code);
        if let Some(state) = &state {
            pairs.append_pair("state", state);
        }
        if ctx.profile.require_iss_in_authorization_response {
            pairs.append_pair("iss", &ctx.profile.issuer);
        }
    }

    AuthorizeOutcome::Redirect(url.to_string())
}

fn build_error_redirect(redirect_uri: &str, error: &OAuthError, state: Option<&str>) -> String {
    let mut url = Url::parse(redirect_uri).unwrap_or_else(|_| Url::parse("about:blank").expect("static URL"));
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("error", error.code());
        pairs.append_pair("error_description", &error.to_string());
        if let Some(state) = state {
            pairs.append_pair("state", state);
        }
    }
    url.to_string()
}

/// Best-effort JWK-thumbprint extraction from a `DPoP` header presented at
/// the authorization endpoint (RFC 9449 §10), so the minted code can later
/// enforce the same binding at the token endpoint. A malformed or absent
/// header simply leaves the code unbound, exactly as if no `DPoP` header
/// had been sent.
fn extract_jkt_best_effort(proof_jwt: &str) -> Option<String> {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    let header_b64 = proof_jwt.split('.').next()?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).ok()?;
    let header: Value = serde_json::from_slice(&header_bytes).ok()?;
    let jwk_value = header.get("jwk")?.clone();
    let jwk: crypto::Jwk = serde_json::from_value(jwk_value).ok()?;
    jwk.thumbprint().ok()
}

trait SessionSatisfiesMaxAge {
    fn satisfies_max_age(&self, max_age: Option<i64>) -> bool;
}

impl SessionSatisfiesMaxAge for SessionContext {
    fn satisfies_max_age(&self, max_age: Option<i64>) -> bool {
        match max_age {
            None => true,
            Some(seconds) => (Utc::now() - self.auth_time).num_seconds() <= seconds,
        }
    }
}
