//! JSON Web Key representation and RFC 7638 thumbprint computation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};

/// Public JWK material, serializable over JWKS and request-object `jwk` headers.
/// Never holds private key material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    // RSA
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    // EC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// Private-key members this type never constructs or serializes, but
    /// which a deserialized attacker-supplied JWK can still carry: `d` is
    /// the EC/RSA private exponent, `p` is the first RSA CRT prime. Kept so
    /// [`Jwk::is_public_only`] can actually witness and reject them instead
    /// of deserializing into a struct engineered to never see one.
    #[serde(default, skip_serializing)]
    pub d: Option<String>,
    #[serde(default, skip_serializing, rename = "p")]
    pub rsa_p: Option<String>,
}

impl Jwk {
    pub fn rsa(kid: &str, alg: &str, n: Vec<u8>, e: Vec<u8>) -> Self {
        Self {
            kty: "RSA".to_string(),
            kid: Some(kid.to_string()),
            key_use: Some("sig".to_string()),
            alg: Some(alg.to_string()),
            n: Some(URL_SAFE_NO_PAD.encode(n)),
            e: Some(URL_SAFE_NO_PAD.encode(e)),
            crv: None,
            x: None,
            y: None,
            d: None,
            rsa_p: None,
        }
    }

    pub fn ec(kid: &str, alg: &str, crv: &str, x: Vec<u8>, y: Vec<u8>) -> Self {
        Self {
            kty: "EC".to_string(),
            kid: Some(kid.to_string()),
            key_use: Some("sig".to_string()),
            alg: Some(alg.to_string()),
            n: None,
            e: None,
            crv: Some(crv.to_string()),
            x: Some(URL_SAFE_NO_PAD.encode(x)),
            y: Some(URL_SAFE_NO_PAD.encode(y)),
            d: None,
            rsa_p: None,
        }
    }

    /// Whether this JWK carries only public material. `d`/`p` are captured
    /// purely so this can reject a JWK that carries them — a DPoP proof
    /// whose `jwk` header includes private key material must be rejected
    /// outright (§4.4 step 1).
    pub fn is_public_only(&self) -> bool {
        self.d.is_none() && self.rsa_p.is_none()
    }

    /// RFC 7638 JWK thumbprint: SHA-256 over the canonical JSON object
    /// containing only the required members, lexicographically ordered by
    /// member name, base64url-encoded without padding.
    pub fn thumbprint(&self) -> CryptoResult<String> {
        let canonical = match self.kty.as_str() {
            "RSA" => {
                let n = self.n.as_deref().ok_or(CryptoError::InvalidKey)?;
                let e = self.e.as_deref().ok_or(CryptoError::InvalidKey)?;
                format!(
                    "{{\"e\":\"{}\",\"kty\":\"RSA\",\"n\":\"{}\"}}",
                    e, n
                )
            }
            "EC" => {
                let crv = self.crv.as_deref().ok_or(CryptoError::InvalidKey)?;
                let x = self.x.as_deref().ok_or(CryptoError::InvalidKey)?;
                let y = self.y.as_deref().ok_or(CryptoError::InvalidKey)?;
                format!(
                    "{{\"crv\":\"{}\",\"kty\":\"EC\",\"x\":\"{}\",\"y\":\"{}\"}}",
                    crv, x, y
                )
            }
            other => return Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        };
        let digest = Sha256::digest(canonical.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructed_jwks_are_public_only() {
        let rsa = Jwk::rsa("kid-1", "RS256", vec![1, 2, 3], vec![1, 0, 1]);
        let ec = Jwk::ec("kid-1", "ES256", "P-256", vec![1, 2], vec![3, 4]);
        assert!(rsa.is_public_only());
        assert!(ec.is_public_only());
    }

    #[test]
    fn deserialized_jwk_carrying_d_is_not_public_only() {
        let value = serde_json::json!({
            "kty": "EC",
            "crv": "P-256",
            "x": "eA",
            "y": "eQ",
            "d": "private-scalar",
        });
        let jwk: Jwk = serde_json::from_value(value).unwrap();
        assert!(!jwk.is_public_only());
    }

    #[test]
    fn deserialized_rsa_jwk_carrying_crt_prime_is_not_public_only() {
        let value = serde_json::json!({
            "kty": "RSA",
            "n": "bg",
            "e": "AQAB",
            "p": "prime",
        });
        let jwk: Jwk = serde_json::from_value(value).unwrap();
        assert!(!jwk.is_public_only());
    }

    #[test]
    fn rsa_thumbprint_is_stable() {
        let jwk = Jwk::rsa("kid-1", "RS256", vec![1, 2, 3], vec![1, 0, 1]);
        let t1 = jwk.thumbprint().unwrap();
        let t2 = jwk.thumbprint().unwrap();
        assert_eq!(t1, t2);
        assert!(!t1.is_empty());
    }

    #[test]
    fn ec_thumbprint_changes_with_coordinates() {
        let a = Jwk::ec("kid-1", "ES256", "P-256", vec![1, 2], vec![3, 4]);
        let b = Jwk::ec("kid-1", "ES256", "P-256", vec![1, 2], vec![3, 5]);
        assert_ne!(a.thumbprint().unwrap(), b.thumbprint().unwrap());
    }

    #[test]
    fn missing_coordinates_are_rejected() {
        let mut jwk = Jwk::ec("kid-1", "ES256", "P-256", vec![1], vec![2]);
        jwk.y = None;
        assert!(jwk.thumbprint().is_err());
    }
}
