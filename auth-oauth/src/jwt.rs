//! JWS compact sign/verify across RS256/RS384/RS512/ES256/ES384/ES512.
//!
//! `alg=none` has no [`KeyAlgorithm`] variant, so it is rejected structurally
//! rather than by an explicit denylist check: any header whose `alg` does not
//! parse into a known algorithm is treated as `AlgNotAllowed`. Five of the six
//! algorithms go through `jsonwebtoken`; P-521 (ES512) is signed and verified
//! by hand since `jsonwebtoken` does not expose it.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use crypto::{Jwk, KeyAlgorithm, SigningKey};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::str::FromStr;
use thiserror::Error;

/// Failure modes of [`sign`]/[`verify`], kept distinct for internal logging
/// and tests. Callers at the protocol boundary collapse all of these to a
/// single `invalid_token` response (§7: "cryptographic verification failures
/// never leak which check failed").
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("malformed claims")]
    BadClaims,
    #[error("algorithm not allowed")]
    AlgNotAllowed,
}

pub type JwtResult<T> = std::result::Result<T, JwtError>;

pub const CLOCK_SKEW_SECONDS: i64 = 60;

fn jsonwebtoken_algorithm(alg: KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::Rs256 => Some(Algorithm::RS256),
        KeyAlgorithm::Rs384 => Some(Algorithm::RS384),
        KeyAlgorithm::Rs512 => Some(Algorithm::RS512),
        KeyAlgorithm::Es256 => Some(Algorithm::ES256),
        KeyAlgorithm::Es384 => Some(Algorithm::ES384),
        KeyAlgorithm::Es512 => None,
    }
}

/// Signs `claims` with `key`, returning a three-segment compact JWS.
pub fn sign(claims: &Value, key: &SigningKey) -> JwtResult<String> {
    match key.alg {
        KeyAlgorithm::Es512 => sign_es512(claims, key),
        alg => {
            let algorithm = jsonwebtoken_algorithm(alg).ok_or(JwtError::AlgNotAllowed)?;
            let mut header = Header::new(algorithm);
            header.kid = Some(key.kid.clone());
            let encoding_key = match alg {
                KeyAlgorithm::Rs256 | KeyAlgorithm::Rs384 | KeyAlgorithm::Rs512 => {
                    EncodingKey::from_rsa_pem(key.private_pem().as_bytes())
                }
                _ => EncodingKey::from_ec_pem(key.private_pem().as_bytes()),
            }
            .map_err(|_| JwtError::BadClaims)?;
            jsonwebtoken::encode(&header, claims, &encoding_key).map_err(|_| JwtError::InvalidSignature)
        }
    }
}

/// Verifies a compact JWS against a single candidate JWK, enforcing the
/// context's algorithm whitelist and a 60-second clock skew tolerance on
/// `exp`/`nbf`. Returns the decoded claims on success.
pub fn verify(token: &str, jwk: &Jwk, allowed_algs: &[KeyAlgorithm]) -> JwtResult<Value> {
    let header = jsonwebtoken::decode_header(token).map_err(|_| JwtError::BadClaims)?;
    let alg = match header.alg {
        Algorithm::RS256 => KeyAlgorithm::Rs256,
        Algorithm::RS384 => KeyAlgorithm::Rs384,
        Algorithm::RS512 => KeyAlgorithm::Rs512,
        Algorithm::ES256 => KeyAlgorithm::Es256,
        Algorithm::ES384 => KeyAlgorithm::Es384,
        _ => return verify_es512(token, jwk, allowed_algs),
    };
    if !allowed_algs.contains(&alg) {
        return Err(JwtError::AlgNotAllowed);
    }

    let decoding_key = match alg {
        KeyAlgorithm::Rs256 | KeyAlgorithm::Rs384 | KeyAlgorithm::Rs512 => {
            let (n, e) = (
                jwk.n.as_deref().ok_or(JwtError::BadClaims)?,
                jwk.e.as_deref().ok_or(JwtError::BadClaims)?,
            );
            DecodingKey::from_rsa_components(n, e).map_err(|_| JwtError::BadClaims)?
        }
        _ => {
            let (x, y) = (
                jwk.x.as_deref().ok_or(JwtError::BadClaims)?,
                jwk.y.as_deref().ok_or(JwtError::BadClaims)?,
            );
            DecodingKey::from_ec_components(x, y).map_err(|_| JwtError::BadClaims)?
        }
    };

    let mut validation = Validation::new(header.alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims.clear();
    validation.insecure_disable_signature_validation = false;

    let data = jsonwebtoken::decode::<Value>(token, &decoding_key, &validation)
        .map_err(|_| JwtError::InvalidSignature)?;
    check_time_claims(&data.claims)?;
    Ok(data.claims)
}

fn sign_es512(claims: &Value, key: &SigningKey) -> JwtResult<String> {
    use p521::ecdsa::{signature::Signer, Signature, SigningKey as EcSigningKey};
    use p521::pkcs8::DecodePrivateKey;

    let header = serde_json::json!({ "alg": "ES512", "typ": "JWT", "kid": key.kid });
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).map_err(|_| JwtError::BadClaims)?),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).map_err(|_| JwtError::BadClaims)?),
    );

    let signing_key = EcSigningKey::from_pkcs8_pem(key.private_pem()).map_err(|_| JwtError::BadClaims)?;
    let signature: Signature = signing_key.sign(signing_input.as_bytes());
    Ok(format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

fn verify_es512(token: &str, jwk: &Jwk, allowed_algs: &[KeyAlgorithm]) -> JwtResult<Value> {
    use p521::ecdsa::{signature::Verifier, Signature, VerifyingKey};

    if !allowed_algs.contains(&KeyAlgorithm::Es512) {
        return Err(JwtError::AlgNotAllowed);
    }

    let mut parts = token.split('.');
    let (header_b64, payload_b64, sig_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => return Err(JwtError::BadClaims),
    };

    let (x, y) = (
        jwk.x.as_deref().ok_or(JwtError::BadClaims)?,
        jwk.y.as_deref().ok_or(JwtError::BadClaims)?,
    );
    let x = URL_SAFE_NO_PAD.decode(x).map_err(|_| JwtError::BadClaims)?;
    let y = URL_SAFE_NO_PAD.decode(y).map_err(|_| JwtError::BadClaims)?;
    let point = p521::EncodedPoint::from_affine_coordinates(
        p521::FieldBytes::from_slice(&x),
        p521::FieldBytes::from_slice(&y),
        false,
    );
    let verifying_key = VerifyingKey::from_encoded_point(&point).map_err(|_| JwtError::BadClaims)?;

    let signature_bytes = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| JwtError::BadClaims)?;
    let signature = Signature::from_slice(&signature_bytes).map_err(|_| JwtError::BadClaims)?;

    let signing_input = format!("{}.{}", header_b64, payload_b64);
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| JwtError::InvalidSignature)?;

    let payload = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| JwtError::BadClaims)?;
    let claims: Value = serde_json::from_slice(&payload).map_err(|_| JwtError::BadClaims)?;
    check_time_claims(&claims)?;
    Ok(claims)
}

/// Decodes an unsecured (`alg=none`, RFC 7519 §6) compact JWT without
/// verifying any signature, since `jsonwebtoken`'s `Algorithm` enum has no
/// `none` variant to decode a header through in the first place. Callers
/// are responsible for gating this on `allow_none_algorithm` *before*
/// calling it — this function itself only checks that the token really is
/// the unsecured form (empty third segment, `alg` header literally
/// `"none"`), matching the hand-rolled-algorithm pattern `sign_es512`/
/// `verify_es512` already use for coverage `jsonwebtoken` lacks.
pub fn decode_unverified_none(token: &str) -> JwtResult<Value> {
    let mut parts = token.split('.');
    let (header_b64, payload_b64, signature_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => return Err(JwtError::BadClaims),
    };
    if !signature_b64.is_empty() {
        return Err(JwtError::InvalidSignature);
    }

    let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).map_err(|_| JwtError::BadClaims)?;
    let header: Value = serde_json::from_slice(&header_bytes).map_err(|_| JwtError::BadClaims)?;
    if header.get("alg").and_then(Value::as_str) != Some("none") {
        return Err(JwtError::BadClaims);
    }

    let payload_bytes = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| JwtError::BadClaims)?;
    let claims: Value = serde_json::from_slice(&payload_bytes).map_err(|_| JwtError::BadClaims)?;
    check_time_claims(&claims)?;
    Ok(claims)
}

fn check_time_claims(claims: &Value) -> JwtResult<()> {
    let now = Utc::now().timestamp();
    if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
        if now - CLOCK_SKEW_SECONDS > exp {
            return Err(JwtError::Expired);
        }
    }
    if let Some(nbf) = claims.get("nbf").and_then(Value::as_i64) {
        if now + CLOCK_SKEW_SECONDS < nbf {
            return Err(JwtError::BadClaims);
        }
    }
    Ok(())
}

/// `at_hash`/`c_hash`/`ath`: leftmost half of the digest paired with `alg`
/// (SHA-256 for the 256-bit family, SHA-384/SHA-512 for the deeper ones),
/// base64url-encoded without padding.
pub fn left_hash(data: &[u8], alg: KeyAlgorithm) -> String {
    let digest = match alg.digest_bits() {
        256 => Sha256::digest(data).to_vec(),
        384 => sha2::Sha384::digest(data).to_vec(),
        _ => sha2::Sha512::digest(data).to_vec(),
    };
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

/// `aud` may be a bare string or an array of strings per §4.2.
pub fn audience_contains(claims: &Value, expected: &str) -> bool {
    match claims.get("aud") {
        Some(Value::String(s)) => s == expected,
        Some(Value::Array(values)) => values.iter().any(|v| v.as_str() == Some(expected)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crypto::KeyManager;
    use serde_json::json;

    fn claims(exp_offset: Duration) -> Value {
        json!({
            "iss": "https://issuer.example",
            "sub": "user-1",
            "aud": "client-1",
            "iat": Utc::now().timestamp(),
            "exp": (Utc::now() + exp_offset).timestamp(),
        })
    }

    #[test]
    fn round_trips_under_es256() {
        let km = KeyManager::bootstrap(KeyAlgorithm::Es256, Duration::days(90), Duration::days(30)).unwrap();
        let key = km.active_key().unwrap();
        let token = sign(&claims(Duration::hours(1)), &key).unwrap();
        let decoded = verify(&token, &key.public_jwk, &[KeyAlgorithm::Es256]).unwrap();
        assert_eq!(decoded["sub"], "user-1");
    }

    #[test]
    fn round_trips_under_es512() {
        let km = KeyManager::bootstrap(KeyAlgorithm::Es512, Duration::days(90), Duration::days(30)).unwrap();
        let key = km.active_key().unwrap();
        let token = sign(&claims(Duration::hours(1)), &key).unwrap();
        let decoded = verify(&token, &key.public_jwk, &[KeyAlgorithm::Es512]).unwrap();
        assert_eq!(decoded["sub"], "user-1");
    }

    #[test]
    fn round_trips_under_rs256() {
        let km = KeyManager::bootstrap(KeyAlgorithm::Rs256, Duration::days(90), Duration::days(30)).unwrap();
        let key = km.active_key().unwrap();
        let token = sign(&claims(Duration::hours(1)), &key).unwrap();
        let decoded = verify(&token, &key.public_jwk, &[KeyAlgorithm::Rs256]).unwrap();
        assert_eq!(decoded["sub"], "user-1");
    }

    #[test]
    fn unverified_none_accepts_a_well_formed_unsecured_token() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims(Duration::hours(1))).unwrap());
        let token = format!("{header}.{payload}.");
        let decoded = decode_unverified_none(&token).unwrap();
        assert_eq!(decoded["sub"], "user-1");
    }

    #[test]
    fn unverified_none_rejects_a_nonempty_signature_segment() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims(Duration::hours(1))).unwrap());
        let token = format!("{header}.{payload}.not-empty");
        assert_eq!(decode_unverified_none(&token), Err(JwtError::InvalidSignature));
    }

    #[test]
    fn unverified_none_rejects_a_header_claiming_a_real_algorithm() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims(Duration::hours(1))).unwrap());
        let token = format!("{header}.{payload}.");
        assert_eq!(decode_unverified_none(&token), Err(JwtError::BadClaims));
    }

    #[test]
    fn bit_flip_is_rejected() {
        let km = KeyManager::bootstrap(KeyAlgorithm::Es256, Duration::days(90), Duration::days(30)).unwrap();
        let key = km.active_key().unwrap();
        let mut token = sign(&claims(Duration::hours(1)), &key).unwrap();
        token.push('x');
        assert!(verify(&token, &key.public_jwk, &[KeyAlgorithm::Es256]).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let km = KeyManager::bootstrap(KeyAlgorithm::Es256, Duration::days(90), Duration::days(30)).unwrap();
        let key = km.active_key().unwrap();
        let token = sign(&claims(Duration::seconds(-300)), &key).unwrap();
        assert_eq!(
            verify(&token, &key.public_jwk, &[KeyAlgorithm::Es256]),
            Err(JwtError::Expired)
        );
    }

    #[test]
    fn alg_outside_whitelist_is_rejected() {
        let km = KeyManager::bootstrap(KeyAlgorithm::Rs256, Duration::days(90), Duration::days(30)).unwrap();
        let key = km.active_key().unwrap();
        let token = sign(&claims(Duration::hours(1)), &key).unwrap();
        assert_eq!(
            verify(&token, &key.public_jwk, &[KeyAlgorithm::Es256]),
            Err(JwtError::AlgNotAllowed)
        );
    }

    #[test]
    fn at_hash_is_stable_and_half_length() {
        let h1 = left_hash(b"access-token-value", KeyAlgorithm::Rs256);
        let h2 = left_hash(b"access-token-value", KeyAlgorithm::Rs256);
        assert_eq!(h1, h2);
        let full = Sha256::digest(b"access-token-value");
        let decoded = URL_SAFE_NO_PAD.decode(&h1).unwrap();
        assert_eq!(decoded.len(), full.len() / 2);
    }
}
