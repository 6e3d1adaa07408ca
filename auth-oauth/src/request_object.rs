//! Request Object Parser (C6, JAR — RFC 9101): decodes a signed `request`
//! JWT into the parameter bundle that overlays the authorization request.

use std::collections::HashMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use crypto::{Jwk, KeyAlgorithm};
use serde_json::Value;

use crate::client_registry::ClientRegistry;
use crate::error::{OAuthError, Result};
use crate::jwt;
use crate::models::{ClientJwksSource, ClientRecord};

pub const MAX_REQUEST_OBJECT_BYTES: usize = 16 * 1024;

/// Parses `request_jwt`, verifying its signature against `client`'s own
/// JWKS, and returns the parameter bundle it carries. `alg=none` is
/// rejected unless `allow_none_algorithm` is set (development profile
/// only); parameters inside the JWT always take precedence over any
/// duplicate supplied on the query string or PAR bundle (§9 design note).
pub fn parse(
    request_jwt: &str,
    client: &ClientRecord,
    allow_none_algorithm: bool,
) -> Result<HashMap<String, String>> {
    if request_jwt.len() > MAX_REQUEST_OBJECT_BYTES {
        return Err(OAuthError::InvalidRequest("request object exceeds 16KiB".to_string()));
    }

    // `jsonwebtoken` has no `none` variant, so an `alg=none` header must be
    // detected from the raw, unverified header before ever calling into it.
    let header = raw_header(request_jwt)?;
    if header.get("alg").and_then(Value::as_str) == Some("none") {
        if !allow_none_algorithm {
            return Err(OAuthError::InvalidRequest("alg=none request objects are rejected".to_string()));
        }
        let claims = jwt::decode_unverified_none(request_jwt)
            .map_err(|_| OAuthError::InvalidRequest("malformed request object".to_string()))?;
        return claims_to_param_bundle(&claims);
    }

    let jwks = match &client.jwks {
        Some(ClientJwksSource::Inline(jwks)) => jwks.clone(),
        Some(ClientJwksSource::Uri(_)) => {
            return Err(OAuthError::ServerError(
                "jwks_uri resolution must be pre-populated by the caller".to_string(),
            ))
        }
        None => return Err(OAuthError::InvalidRequest("client has no JWKS to verify request object".to_string())),
    };

    let allowed: Vec<KeyAlgorithm> = client
        .allowed_signing_algs
        .iter()
        .filter_map(|a| a.parse().ok())
        .collect();
    let allowed = if allowed.is_empty() {
        vec![
            KeyAlgorithm::Rs256,
            KeyAlgorithm::Es256,
            KeyAlgorithm::Rs384,
            KeyAlgorithm::Es384,
            KeyAlgorithm::Rs512,
            KeyAlgorithm::Es512,
        ]
    } else {
        allowed
    };

    let claims = verify_against_any(request_jwt, &jwks, &allowed)?;
    claims_to_param_bundle(&claims)
}

/// Decodes the JWT header segment without touching the signature, purely to
/// read `alg` before deciding whether this is a `jsonwebtoken`-verifiable
/// token or the hand-rolled unsecured form.
fn raw_header(token: &str) -> Result<Value> {
    let header_b64 = token
        .split('.')
        .next()
        .ok_or_else(|| OAuthError::InvalidRequest("malformed request object".to_string()))?;
    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| OAuthError::InvalidRequest("malformed request object".to_string()))?;
    serde_json::from_slice(&header_bytes).map_err(|_| OAuthError::InvalidRequest("malformed request object".to_string()))
}

fn verify_against_any(token: &str, jwks: &[Jwk], allowed: &[KeyAlgorithm]) -> Result<Value> {
    for jwk in jwks {
        if let Ok(claims) = jwt::verify(token, jwk, allowed) {
            return Ok(claims);
        }
    }
    Err(OAuthError::InvalidRequest("request object signature verification failed".to_string()))
}

fn claims_to_param_bundle(claims: &Value) -> Result<HashMap<String, String>> {
    let object = claims
        .as_object()
        .ok_or_else(|| OAuthError::InvalidRequest("request object claims must be a JSON object".to_string()))?;

    let mut bundle = HashMap::new();
    for (key, value) in object {
        let as_param = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => continue,
            other => serde_json::to_string(other).map_err(|_| {
                OAuthError::InvalidRequest(format!("request object claim '{key}' is not representable as a parameter"))
            })?,
        };
        bundle.insert(key.clone(), as_param);
    }
    Ok(bundle)
}

/// Given `overlay` parsed from a `request`/`request_uri` bundle, merges it
/// onto `base` query parameters with overlay values winning on conflict
/// (§9: "Request-object precedence").
pub fn overlay_params(base: &mut HashMap<String, String>, overlay: HashMap<String, String>) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}

/// Convenience used by the Authorization Endpoint when it already holds a
/// loaded client registry and only the raw JWT + claimed `client_id`.
pub fn parse_for_client(
    registry: &ClientRegistry,
    request_jwt: &str,
    claimed_client_id: &str,
    allow_none_algorithm: bool,
) -> Result<HashMap<String, String>> {
    let client = registry
        .load(claimed_client_id)
        .ok_or(OAuthError::InvalidClient)?;
    parse(request_jwt, &client, allow_none_algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SubjectType, TokenEndpointAuthMethod};
    use chrono::Duration;
    use crypto::KeyManager;
    use serde_json::json;
    use std::collections::HashSet;

    fn client_with_jwks(jwk: Jwk) -> ClientRecord {
        ClientRecord {
            client_id: "client-1".to_string(),
            client_secret_hash: None,
            redirect_uris: HashSet::from(["https://rp.example/cb".to_string()]),
            grant_types: HashSet::from(["authorization_code".to_string()]),
            response_types: HashSet::from(["code".to_string()]),
            scope: vec!["openid".to_string()],
            token_endpoint_auth_method: TokenEndpointAuthMethod::PrivateKeyJwt,
            jwks: Some(ClientJwksSource::Inline(vec![jwk])),
            subject_type: SubjectType::Public,
            sector_identifier_uri: None,
            application_type: "web".to_string(),
            require_pkce: true,
            allowed_signing_algs: HashSet::from(["ES256".to_string()]),
            is_confidential: true,
        }
    }

    #[test]
    fn signed_request_object_overlays_params() {
        let km = KeyManager::bootstrap(KeyAlgorithm::Es256, Duration::days(90), Duration::days(30)).unwrap();
        let key = km.active_key().unwrap();
        let claims = json!({
            "response_type": "code",
            "client_id": "client-1",
            "redirect_uri": "https://rp.example/cb",
            "scope": "openid profile",
            "state": "xyz",
        });
        let jwt_str = jwt::sign(&claims, &key).unwrap();
        let client = client_with_jwks(key.public_jwk.clone());

        let bundle = parse(&jwt_str, &client, false).unwrap();
        assert_eq!(bundle.get("redirect_uri").unwrap(), "https://rp.example/cb");
        assert_eq!(bundle.get("scope").unwrap(), "openid profile");
    }

    #[test]
    fn request_object_without_client_jwks_is_rejected() {
        let km = KeyManager::bootstrap(KeyAlgorithm::Es256, Duration::days(90), Duration::days(30)).unwrap();
        let key = km.active_key().unwrap();
        let claims = json!({ "response_type": "code" });
        let jwt_str = jwt::sign(&claims, &key).unwrap();

        let mut client = client_with_jwks(key.public_jwk.clone());
        client.jwks = None;
        assert!(parse(&jwt_str, &client, false).is_err());
    }

    #[test]
    fn oversized_request_object_is_rejected() {
        let client = client_with_jwks(Jwk::rsa("k", "RS256", vec![1], vec![1]));
        let huge = "x".repeat(MAX_REQUEST_OBJECT_BYTES + 1);
        assert!(parse(&huge, &client, false).is_err());
    }

    fn unsecured_request_object() -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let claims = json!({
            "response_type": "code",
            "client_id": "client-1",
            "redirect_uri": "https://rp.example/cb",
        });
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        format!("{header}.{payload}.")
    }

    #[test]
    fn alg_none_is_rejected_when_not_allowed() {
        let client = client_with_jwks(Jwk::rsa("k", "RS256", vec![1], vec![1]));
        let token = unsecured_request_object();
        assert!(parse(&token, &client, false).is_err());
    }

    #[test]
    fn alg_none_is_accepted_when_allowed() {
        let client = client_with_jwks(Jwk::rsa("k", "RS256", vec![1], vec![1]));
        let token = unsecured_request_object();
        let bundle = parse(&token, &client, true).unwrap();
        assert_eq!(bundle.get("redirect_uri").unwrap(), "https://rp.example/cb");
    }
}
