//! Signing key lifecycle: generation, rotation with an overlap window, and
//! retention-bounded eviction. Mirrors the active/rotating/retired lifecycle
//! a relational key table would enforce, but held entirely in memory and
//! guarded by a single lock so mutations are always serialized.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use parking_lot::RwLock;
use rsa::pkcs8::EncodePrivateKey as RsaEncodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use uuid::Uuid;

use crate::error::{CryptoError, CryptoResult};
use crate::jwk::Jwk;

const RSA_KEY_BITS: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyAlgorithm {
    Rs256,
    Rs384,
    Rs512,
    Es256,
    Es384,
    Es512,
}

impl KeyAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyAlgorithm::Rs256 => "RS256",
            KeyAlgorithm::Rs384 => "RS384",
            KeyAlgorithm::Rs512 => "RS512",
            KeyAlgorithm::Es256 => "ES256",
            KeyAlgorithm::Es384 => "ES384",
            KeyAlgorithm::Es512 => "ES512",
        }
    }

    pub fn is_rsa(self) -> bool {
        matches!(self, KeyAlgorithm::Rs256 | KeyAlgorithm::Rs384 | KeyAlgorithm::Rs512)
    }

    /// Digest algorithm governing `at_hash`/`c_hash`/`ath` truncation, per
    /// the pairing defined for each JWS alg in RFC 7518 §3.1.
    pub fn digest_bits(self) -> usize {
        match self {
            KeyAlgorithm::Rs256 | KeyAlgorithm::Es256 => 256,
            KeyAlgorithm::Rs384 | KeyAlgorithm::Es384 => 384,
            KeyAlgorithm::Rs512 | KeyAlgorithm::Es512 => 512,
        }
    }
}

impl std::str::FromStr for KeyAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RS256" => Ok(KeyAlgorithm::Rs256),
            "RS384" => Ok(KeyAlgorithm::Rs384),
            "RS512" => Ok(KeyAlgorithm::Rs512),
            "ES256" => Ok(KeyAlgorithm::Es256),
            "ES384" => Ok(KeyAlgorithm::Es384),
            "ES512" => Ok(KeyAlgorithm::Es512),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// A signing key. `private_pem` is PKCS#8 and never leaves this crate over
/// any serialization boundary — only [`SigningKey::public_jwk`] is meant to
/// cross an RPC or HTTP boundary.
#[derive(Clone)]
pub struct SigningKey {
    pub kid: String,
    pub alg: KeyAlgorithm,
    private_pem: Arc<str>,
    pub public_pem: Arc<str>,
    pub public_jwk: Jwk,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub retired_at: Option<DateTime<Utc>>,
    pub tokens_signed: u64,
}

impl SigningKey {
    pub fn private_pem(&self) -> &str {
        &self.private_pem
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("alg", &self.alg.as_str())
            .field("active", &self.active)
            .field("private_pem", &"<redacted>")
            .finish()
    }
}

fn new_kid() -> String {
    format!("k{}", Uuid::new_v4().simple())
}

fn generate_rsa(alg: KeyAlgorithm) -> CryptoResult<SigningKey> {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
        .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;
    let public_key = private_key.to_public_key();

    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?
        .to_string();
    let public_pem = rsa::pkcs8::EncodePublicKey::to_public_key_pem(&public_key, LineEnding::LF)
        .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;

    let kid = new_kid();
    let jwk = Jwk::rsa(
        &kid,
        alg.as_str(),
        public_key.n().to_bytes_be(),
        public_key.e().to_bytes_be(),
    );

    Ok(SigningKey {
        kid,
        alg,
        private_pem: Arc::from(private_pem),
        public_pem: Arc::from(public_pem),
        public_jwk: jwk,
        created_at: Utc::now(),
        activated_at: None,
        active: false,
        retired_at: None,
        tokens_signed: 0,
    })
}

fn generate_es256() -> CryptoResult<SigningKey> {
    let signing_key = P256SigningKey::random(&mut rand::rngs::OsRng);
    let verifying_key = P256VerifyingKey::from(&signing_key);
    let point = verifying_key.to_encoded_point(false);
    let (x, y) = (
        point.x().ok_or(CryptoError::InvalidKey)?.to_vec(),
        point.y().ok_or(CryptoError::InvalidKey)?.to_vec(),
    );

    let private_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?
        .to_string();
    let public_pem = verifying_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;

    let kid = new_kid();
    let jwk = Jwk::ec(&kid, "ES256", "P-256", x, y);

    Ok(SigningKey {
        kid,
        alg: KeyAlgorithm::Es256,
        private_pem: Arc::from(private_pem),
        public_pem: Arc::from(public_pem),
        public_jwk: jwk,
        created_at: Utc::now(),
        activated_at: None,
        active: false,
        retired_at: None,
        tokens_signed: 0,
    })
}

fn generate_es384() -> CryptoResult<SigningKey> {
    use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
    use p384::elliptic_curve::sec1::ToEncodedPoint as _;
    use p384::pkcs8::{EncodePrivateKey as _, EncodePublicKey as _, LineEnding as P384LineEnding};

    let signing_key = P384SigningKey::random(&mut rand::rngs::OsRng);
    let verifying_key = P384VerifyingKey::from(&signing_key);
    let point = verifying_key.to_encoded_point(false);
    let (x, y) = (
        point.x().ok_or(CryptoError::InvalidKey)?.to_vec(),
        point.y().ok_or(CryptoError::InvalidKey)?.to_vec(),
    );

    let private_pem = signing_key
        .to_pkcs8_pem(P384LineEnding::LF)
        .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?
        .to_string();
    let public_pem = verifying_key
        .to_public_key_pem(P384LineEnding::LF)
        .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;

    let kid = new_kid();
    let jwk = Jwk::ec(&kid, "ES384", "P-384", x, y);

    Ok(SigningKey {
        kid,
        alg: KeyAlgorithm::Es384,
        private_pem: Arc::from(private_pem),
        public_pem: Arc::from(public_pem),
        public_jwk: jwk,
        created_at: Utc::now(),
        activated_at: None,
        active: false,
        retired_at: None,
        tokens_signed: 0,
    })
}

fn generate_es512() -> CryptoResult<SigningKey> {
    use p521::ecdsa::{SigningKey as P521SigningKey, VerifyingKey as P521VerifyingKey};
    use p521::elliptic_curve::sec1::ToEncodedPoint as _;
    use p521::pkcs8::{EncodePrivateKey as _, EncodePublicKey as _, LineEnding as P521LineEnding};

    let signing_key = P521SigningKey::random(&mut rand::rngs::OsRng);
    let verifying_key = P521VerifyingKey::from(&signing_key);
    let point = verifying_key.to_encoded_point(false);
    let (x, y) = (
        point.x().ok_or(CryptoError::InvalidKey)?.to_vec(),
        point.y().ok_or(CryptoError::InvalidKey)?.to_vec(),
    );

    let private_pem = signing_key
        .to_pkcs8_pem(P521LineEnding::LF)
        .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?
        .to_string();
    let public_pem = verifying_key
        .to_public_key_pem(P521LineEnding::LF)
        .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;

    let kid = new_kid();
    let jwk = Jwk::ec(&kid, "ES512", "P-521", x, y);

    Ok(SigningKey {
        kid,
        alg: KeyAlgorithm::Es512,
        private_pem: Arc::from(private_pem),
        public_pem: Arc::from(public_pem),
        public_jwk: jwk,
        created_at: Utc::now(),
        activated_at: None,
        active: false,
        retired_at: None,
        tokens_signed: 0,
    })
}

fn generate(alg: KeyAlgorithm) -> CryptoResult<SigningKey> {
    match alg {
        KeyAlgorithm::Rs256 | KeyAlgorithm::Rs384 | KeyAlgorithm::Rs512 => generate_rsa(alg),
        KeyAlgorithm::Es256 => generate_es256(),
        KeyAlgorithm::Es384 => generate_es384(),
        KeyAlgorithm::Es512 => generate_es512(),
    }
}

struct KeyManagerInner {
    keys: HashMap<String, SigningKey>,
    active_kid: String,
    last_rotation: DateTime<Utc>,
}

/// Owns the signing key set for one issuer. All mutation happens behind a
/// single write lock (§5: "all mutations serialized by C1's lock").
pub struct KeyManager {
    inner: RwLock<KeyManagerInner>,
    default_alg: KeyAlgorithm,
    rotation_interval: Duration,
    retention_window: Duration,
}

impl KeyManager {
    /// Bootstraps with one freshly generated, immediately active key.
    pub fn bootstrap(
        default_alg: KeyAlgorithm,
        rotation_interval: Duration,
        retention_window: Duration,
    ) -> CryptoResult<Self> {
        let mut key = generate(default_alg)?;
        let now = Utc::now();
        key.active = true;
        key.activated_at = Some(now);
        let kid = key.kid.clone();

        let mut keys = HashMap::new();
        keys.insert(kid.clone(), key);

        Ok(Self {
            inner: RwLock::new(KeyManagerInner {
                keys,
                active_kid: kid,
                last_rotation: now,
            }),
            default_alg,
            rotation_interval,
            retention_window,
        })
    }

    pub fn active_key(&self) -> CryptoResult<SigningKey> {
        let inner = self.inner.read();
        inner
            .keys
            .get(&inner.active_kid)
            .cloned()
            .ok_or(CryptoError::NoActiveKey)
    }

    pub fn get(&self, kid: &str) -> Option<SigningKey> {
        self.inner.read().keys.get(kid).cloned()
    }

    /// All JWKs that must currently be published: the active key plus any
    /// retired key still inside its retention window.
    pub fn all_public_jwks(&self) -> Vec<Jwk> {
        let inner = self.inner.read();
        let now = Utc::now();
        inner
            .keys
            .values()
            .filter(|k| {
                k.active
                    || k.retired_at
                        .map(|retired_at| now - retired_at <= self.retention_window)
                        .unwrap_or(true)
            })
            .map(|k| k.public_jwk.clone())
            .collect()
    }

    pub fn should_rotate(&self) -> bool {
        Utc::now() - self.inner.read().last_rotation >= self.rotation_interval
    }

    /// Generates a new active key, retires the previous one, and evicts any
    /// key whose retention window has elapsed. The swap is atomic under the
    /// write lock: readers never observe zero or two active keys.
    pub fn rotate(&self) -> CryptoResult<SigningKey> {
        let new_key = generate(self.default_alg)?;
        let mut inner = self.inner.write();
        let now = Utc::now();

        if let Some(prev) = inner.keys.get_mut(&inner.active_kid.clone()) {
            prev.active = false;
            prev.retired_at = Some(now);
        }

        let mut new_key = new_key;
        new_key.active = true;
        new_key.activated_at = Some(now);
        let new_kid = new_key.kid.clone();
        inner.keys.insert(new_kid.clone(), new_key.clone());
        inner.active_kid = new_kid;
        inner.last_rotation = now;

        let retention_window = self.retention_window;
        inner
            .keys
            .retain(|_, k| k.active || k.retired_at.map(|r| now - r <= retention_window).unwrap_or(true));

        Ok(new_key)
    }

    pub fn note_signed(&self, kid: &str) {
        if let Some(key) = self.inner.write().keys.get_mut(kid) {
            key.tokens_signed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> KeyManager {
        KeyManager::bootstrap(KeyAlgorithm::Es256, Duration::days(90), Duration::days(30)).unwrap()
    }

    #[test]
    fn bootstrap_has_exactly_one_active_key() {
        let km = manager();
        let active = km.active_key().unwrap();
        assert!(active.active);
        assert_eq!(km.all_public_jwks().len(), 1);
    }

    #[test]
    fn rotate_keeps_previous_key_published_until_retention_elapses() {
        let km = manager();
        let old = km.active_key().unwrap();
        let rotated = km.rotate().unwrap();

        assert_ne!(old.kid, rotated.kid);
        assert_eq!(km.active_key().unwrap().kid, rotated.kid);

        let jwks = km.all_public_jwks();
        assert_eq!(jwks.len(), 2);
        assert!(jwks.iter().any(|j| j.kid.as_deref() == Some(old.kid.as_str())));
    }

    #[test]
    fn rotate_evicts_keys_past_retention() {
        let km = KeyManager::bootstrap(KeyAlgorithm::Es256, Duration::days(90), Duration::zero()).unwrap();
        let old = km.active_key().unwrap();
        km.rotate().unwrap();
        let jwks = km.all_public_jwks();
        assert!(!jwks.iter().any(|j| j.kid.as_deref() == Some(old.kid.as_str())));
    }

    #[test]
    fn should_rotate_respects_interval() {
        let km = KeyManager::bootstrap(KeyAlgorithm::Es256, Duration::days(90), Duration::days(30)).unwrap();
        assert!(!km.should_rotate());
    }

    #[test]
    fn rsa_key_generation_round_trips_jwk() {
        let key = generate_rsa(KeyAlgorithm::Rs256).unwrap();
        assert_eq!(key.alg, KeyAlgorithm::Rs256);
        assert!(key.public_jwk.n.is_some());
        assert!(key.public_jwk.thumbprint().is_ok());
    }
}
