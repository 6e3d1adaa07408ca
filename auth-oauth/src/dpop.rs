//! DPoP Verifier (C4, RFC 9449): sender-constrained proof validation and
//! a per-thumbprint replay cache.

use std::collections::HashMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use crypto::{Jwk, KeyAlgorithm};
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{OAuthError, Result};
use crate::jwt;

/// The thumbprint a caller must bind their access token to, per RFC 7638.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DPoPProofOutcome {
    pub jkt: String,
}

/// Replay cache entry, keyed by `(jkt, jti)` (§3 DPoPNonceRecord; §4.4).
struct ReplayCache {
    seen: HashMap<(String, String), DateTime<Utc>>,
}

impl ReplayCache {
    fn new() -> Self {
        Self { seen: HashMap::new() }
    }

    fn check_and_insert(&mut self, jkt: &str, jti: &str, exp: DateTime<Utc>) -> bool {
        self.sweep();
        let key = (jkt.to_string(), jti.to_string());
        if self.seen.contains_key(&key) {
            return false;
        }
        self.seen.insert(key, exp);
        true
    }

    fn sweep(&mut self) {
        let now = Utc::now();
        self.seen.retain(|_, exp| *exp > now);
    }
}

/// Validates DPoP proofs and tracks replay across requests. One instance is
/// shared by the token endpoint, authorization endpoint and UserInfo
/// verifier.
pub struct DPoPVerifier {
    replay_cache: Mutex<ReplayCache>,
    proof_window: Duration,
    allowed_algs: Vec<KeyAlgorithm>,
}

impl DPoPVerifier {
    pub fn new(proof_window: Duration, allowed_algs: Vec<KeyAlgorithm>) -> Self {
        Self {
            replay_cache: Mutex::new(ReplayCache::new()),
            proof_window,
            allowed_algs,
        }
    }

    /// Validates a `DPoP` header proof against `http_method`/`http_url`,
    /// optionally binding it to `access_token` via the `ath` claim (§4.4
    /// step 3), and returns the JWK thumbprint on success.
    pub fn verify(
        &self,
        proof_jwt: &str,
        http_method: &str,
        http_url: &str,
        access_token: Option<&str>,
    ) -> Result<DPoPProofOutcome> {
        let header = jsonwebtoken::decode_header(proof_jwt).map_err(|_| OAuthError::InvalidDPoPProof)?;

        if header.typ.as_deref() != Some("dpop+jwt") {
            return Err(OAuthError::InvalidDPoPProof);
        }

        let jwk = extract_jwk_from_header(proof_jwt)?;
        if !jwk.is_public_only() {
            return Err(OAuthError::InvalidDPoPProof);
        }

        let claims = jwt::verify(proof_jwt, &jwk, &self.allowed_algs).map_err(|_| OAuthError::InvalidDPoPProof)?;

        let htm = claims
            .get("htm")
            .and_then(Value::as_str)
            .ok_or(OAuthError::InvalidDPoPProof)?;
        if !htm.eq_ignore_ascii_case(http_method) {
            return Err(OAuthError::InvalidDPoPProof);
        }

        let htu = claims
            .get("htu")
            .and_then(Value::as_str)
            .ok_or(OAuthError::InvalidDPoPProof)?;
        if strip_query_and_fragment(htu) != strip_query_and_fragment(http_url) {
            return Err(OAuthError::InvalidDPoPProof);
        }

        let iat = claims
            .get("iat")
            .and_then(Value::as_i64)
            .ok_or(OAuthError::InvalidDPoPProof)?;
        let iat_time = DateTime::from_timestamp(iat, 0).ok_or(OAuthError::InvalidDPoPProof)?;
        let now = Utc::now();
        if (now - iat_time).abs() > Duration::seconds(jwt::CLOCK_SKEW_SECONDS) {
            return Err(OAuthError::InvalidDPoPProof);
        }

        if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
            let exp_time = DateTime::from_timestamp(exp, 0).ok_or(OAuthError::InvalidDPoPProof)?;
            if exp_time - iat_time > Duration::seconds(120) {
                return Err(OAuthError::InvalidDPoPProof);
            }
        }

        let jti = claims
            .get("jti")
            .and_then(Value::as_str)
            .ok_or(OAuthError::InvalidDPoPProof)?;

        let jkt = jwk.thumbprint().map_err(|_| OAuthError::InvalidDPoPProof)?;

        let cache_exp = iat_time + self.proof_window;
        if !self.replay_cache.lock().check_and_insert(&jkt, jti, cache_exp) {
            return Err(OAuthError::InvalidDPoPProof);
        }

        if let Some(token) = access_token {
            let ath = claims
                .get("ath")
                .and_then(Value::as_str)
                .ok_or(OAuthError::InvalidDPoPProof)?;
            let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()));
            if ath != expected {
                return Err(OAuthError::InvalidDPoPProof);
            }
        }

        Ok(DPoPProofOutcome { jkt })
    }
}

fn extract_jwk_from_header(token: &str) -> Result<Jwk> {
    let header_b64 = token.split('.').next().ok_or(OAuthError::InvalidDPoPProof)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).map_err(|_| OAuthError::InvalidDPoPProof)?;
    let header: Value = serde_json::from_slice(&header_bytes).map_err(|_| OAuthError::InvalidDPoPProof)?;
    let jwk_value = header.get("jwk").cloned().ok_or(OAuthError::InvalidDPoPProof)?;
    serde_json::from_value(jwk_value).map_err(|_| OAuthError::InvalidDPoPProof)
}

fn strip_query_and_fragment(url: &str) -> &str {
    let without_fragment = url.split('#').next().unwrap_or(url);
    without_fragment.split('?').next().unwrap_or(without_fragment)
}

/// `ath` claim helper shared with the UserInfo verifier (§4.12).
pub fn access_token_hash(access_token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(access_token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto::KeyManager;
    use serde_json::json;

    fn sign_proof(jkt_key: &crypto::SigningKey, htm: &str, htu: &str, ath: Option<&str>) -> String {
        let mut claims = json!({
            "htm": htm,
            "htu": htu,
            "iat": Utc::now().timestamp(),
            "jti": uuid::Uuid::new_v4().to_string(),
        });
        if let Some(ath) = ath {
            claims["ath"] = json!(ath);
        }

        // Sign with a throwaway key and attach its JWK in the header, as a
        // real DPoP proof does (the proof key is never the OP's signing
        // key); we reuse `jwt::sign` and post-process the header to add
        // `typ`/`jwk`, since the codec is shared rather than duplicated.
        let compact = jwt::sign(&claims, jkt_key).unwrap();
        let mut parts = compact.split('.');
        let header_b64 = parts.next().unwrap();
        let payload_b64 = parts.next().unwrap();
        let sig_b64 = parts.next().unwrap();

        let mut header: Value = serde_json::from_slice(
            &URL_SAFE_NO_PAD.decode(header_b64).unwrap(),
        )
        .unwrap();
        header["typ"] = json!("dpop+jwt");
        header["jwk"] = serde_json::to_value(&jkt_key.public_jwk).unwrap();

        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap()),
            payload_b64,
            sig_b64
        )
    }

    #[test]
    fn valid_proof_is_accepted_once_and_rejected_on_replay() {
        let km = KeyManager::bootstrap(KeyAlgorithm::Es256, chrono::Duration::days(90), chrono::Duration::days(30)).unwrap();
        let key = km.active_key().unwrap();
        let proof = sign_proof(&key, "POST", "https://as.example/token", None);

        let verifier = DPoPVerifier::new(Duration::seconds(60), vec![KeyAlgorithm::Es256]);
        let outcome = verifier.verify(&proof, "POST", "https://as.example/token", None).unwrap();
        assert_eq!(outcome.jkt, key.public_jwk.thumbprint().unwrap());

        let replay = verifier.verify(&proof, "POST", "https://as.example/token", None);
        assert!(matches!(replay, Err(OAuthError::InvalidDPoPProof)));
    }

    #[test]
    fn htu_query_and_fragment_are_stripped_before_comparison() {
        let km = KeyManager::bootstrap(KeyAlgorithm::Es256, chrono::Duration::days(90), chrono::Duration::days(30)).unwrap();
        let key = km.active_key().unwrap();
        let proof = sign_proof(&key, "GET", "https://as.example/userinfo", None);

        let verifier = DPoPVerifier::new(Duration::seconds(60), vec![KeyAlgorithm::Es256]);
        let outcome = verifier.verify(&proof, "GET", "https://as.example/userinfo?x=1#frag", None);
        assert!(outcome.is_ok());
    }

    #[test]
    fn method_mismatch_is_rejected() {
        let km = KeyManager::bootstrap(KeyAlgorithm::Es256, chrono::Duration::days(90), chrono::Duration::days(30)).unwrap();
        let key = km.active_key().unwrap();
        let proof = sign_proof(&key, "POST", "https://as.example/token", None);

        let verifier = DPoPVerifier::new(Duration::seconds(60), vec![KeyAlgorithm::Es256]);
        assert!(verifier.verify(&proof, "GET", "https://as.example/token", None).is_err());
    }

    #[test]
    fn ath_mismatch_is_rejected() {
        let km = KeyManager::bootstrap(KeyAlgorithm::Es256, chrono::Duration::days(90), chrono::Duration::days(30)).unwrap();
        let key = km.active_key().unwrap();
        let proof = sign_proof(&key, "GET", "https://as.example/userinfo", Some("wrong-hash"));

        let verifier = DPoPVerifier::new(Duration::seconds(60), vec![KeyAlgorithm::Es256]);
        let result = verifier.verify(&proof, "GET", "https://as.example/userinfo", Some("token-value"));
        assert!(result.is_err());
    }

    #[test]
    fn correct_ath_is_accepted() {
        let km = KeyManager::bootstrap(KeyAlgorithm::Es256, chrono::Duration::days(90), chrono::Duration::days(30)).unwrap();
        let key = km.active_key().unwrap();
        let ath = access_token_hash("token-value");
        let proof = sign_proof(&key, "GET", "https://as.example/userinfo", Some(&ath));

        let verifier = DPoPVerifier::new(Duration::seconds(60), vec![KeyAlgorithm::Es256]);
        let result = verifier.verify(&proof, "GET", "https://as.example/userinfo", Some("token-value"));
        assert!(result.is_ok());
    }
}
