//! UserInfo Verifier (C12): access-token verification, DPoP-binding
//! enforcement, and scope-to-claim projection.

use std::collections::HashSet;

use chrono::Utc;
use crypto::{Jwk, KeyAlgorithm};
use serde_json::{json, Map, Value};

use crate::dpop::DPoPVerifier;
use crate::error::{OAuthError, Result};
use crate::jwt;
use crate::revocation::RevocationTable;

/// How the access token was presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScheme {
    Bearer,
    DPoP,
}

pub struct UserInfoRequest<'a> {
    pub scheme: TokenScheme,
    pub token: &'a str,
    pub dpop_proof: Option<&'a str>,
    pub http_method: &'a str,
    pub http_url: &'a str,
    /// Individually requested claims carried on the original authorization
    /// request's `claims` parameter, if the access token's scope didn't
    /// bundle them (§4.12).
    pub requested_claims: Option<&'a Value>,
}

/// Projects verified access-token claims into the UserInfo response body,
/// per the scope-to-claim table in §4.12 and OIDC Core §5.4.
pub fn verify(
    request: &UserInfoRequest,
    issuer_jwks: &[Jwk],
    allowed_algs: &[KeyAlgorithm],
    dpop: &DPoPVerifier,
    revocation: &RevocationTable,
) -> Result<Value> {
    let claims = verify_against_any(request.token, issuer_jwks, allowed_algs)?;

    let cnf_jkt = claims.get("cnf").and_then(|c| c.get("jkt")).and_then(Value::as_str);

    match (request.scheme, cnf_jkt) {
        (TokenScheme::Bearer, Some(_)) => return Err(OAuthError::InvalidToken),
        (TokenScheme::DPoP, Some(expected_jkt)) => {
            let proof = request.dpop_proof.ok_or(OAuthError::InvalidDPoPProof)?;
            let outcome = dpop
                .verify(proof, request.http_method, request.http_url, Some(request.token))
                .map_err(|_| OAuthError::InvalidDPoPProof)?;
            if outcome.jkt != expected_jkt {
                return Err(OAuthError::InvalidDPoPProof);
            }
        }
        (TokenScheme::DPoP, None) => return Err(OAuthError::InvalidToken),
        (TokenScheme::Bearer, None) => {}
    }

    let jti = claims.get("jti").and_then(Value::as_str).ok_or(OAuthError::InvalidToken)?;
    if revocation.is_revoked(jti) {
        return Err(OAuthError::InvalidToken);
    }
    if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
        if exp < Utc::now().timestamp() {
            return Err(OAuthError::InvalidToken);
        }
    }

    let sub = claims.get("sub").and_then(Value::as_str).ok_or(OAuthError::InvalidToken)?;
    let scope_tokens: HashSet<&str> = claims
        .get("scope")
        .and_then(Value::as_str)
        .map(|s| s.split_whitespace().collect())
        .unwrap_or_default();

    Ok(project_claims(sub, &scope_tokens, request.requested_claims))
}

fn verify_against_any(token: &str, jwks: &[Jwk], allowed_algs: &[KeyAlgorithm]) -> Result<Value> {
    for jwk in jwks {
        if let Ok(claims) = jwt::verify(token, jwk, allowed_algs) {
            return Ok(claims);
        }
    }
    Err(OAuthError::InvalidToken)
}

fn project_claims(sub: &str, scope: &HashSet<&str>, requested_claims: Option<&Value>) -> Value {
    let mut body = Map::new();
    body.insert("sub".to_string(), json!(sub));

    if scope.contains("profile") {
        for claim in ["name", "given_name", "family_name", "preferred_username", "picture", "updated_at"] {
            body.insert(claim.to_string(), Value::Null);
        }
    }
    if scope.contains("email") {
        body.insert("email".to_string(), Value::Null);
        body.insert("email_verified".to_string(), Value::Null);
    }
    if scope.contains("address") {
        body.insert("address".to_string(), Value::Null);
    }
    if scope.contains("phone") {
        body.insert("phone_number".to_string(), Value::Null);
        body.insert("phone_number_verified".to_string(), Value::Null);
    }

    // §4.12: claims individually requested via the original `claims`
    // parameter are honored even without the bundled scope.
    if let Some(Value::Object(sections)) = requested_claims {
        if let Some(Value::Object(userinfo_claims)) = sections.get("userinfo") {
            for claim_name in userinfo_claims.keys() {
                body.entry(claim_name.clone()).or_insert(Value::Null);
            }
        }
    }

    Value::Object(body)
}
