//! PKCE Verifier (C3, RFC 7636).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{OAuthError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PkceMethod {
    Plain,
    S256,
}

impl PkceMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "plain" => Some(PkceMethod::Plain),
            "S256" => Some(PkceMethod::S256),
            _ => None,
        }
    }
}

static VERIFIER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9\-._~]{43,128}$").unwrap());

/// Verifies `verifier` against `challenge` under `method`. `plain` is only
/// ever reachable if the caller's profile allows it (§4.3); this function
/// itself treats both methods uniformly and leaves policy to the caller.
pub fn verify(challenge: &str, method: PkceMethod, verifier: &str) -> Result<()> {
    if !VERIFIER_PATTERN.is_match(verifier) {
        return Err(OAuthError::InvalidGrant("malformed code_verifier".to_string()));
    }

    let matches = match method {
        PkceMethod::Plain => verifier == challenge,
        PkceMethod::S256 => {
            let digest = Sha256::digest(verifier.as_bytes());
            URL_SAFE_NO_PAD.encode(digest) == challenge
        }
    };

    if matches {
        Ok(())
    } else {
        Err(OAuthError::InvalidGrant("code_verifier mismatch".to_string()))
    }
}
