//! Pushed Authorization Request store (C7, RFC 9126): single-use
//! `request_uri` mapping with a short, profile-controlled TTL.

use std::collections::HashMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rand::RngCore;

use crate::error::{OAuthError, Result};
use crate::models::PARRequest;

fn random_request_uri() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("urn:ietf:params:oauth:request_uri:{}", URL_SAFE_NO_PAD.encode(bytes))
}

/// In-memory PAR store. Requests are deleted on first read regardless of
/// whether the caller ultimately succeeds (§3: "deleted on first read").
pub struct ParStore {
    requests: Mutex<HashMap<String, PARRequest>>,
    ttl: Duration,
}

impl ParStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn put(&self, client_id: String, params: HashMap<String, String>) -> String {
        let request_uri = random_request_uri();
        let record = PARRequest {
            request_uri: request_uri.clone(),
            client_id,
            params,
            created_at: Utc::now(),
        };
        self.requests.lock().insert(request_uri.clone(), record);
        request_uri
    }

    /// Consumes `request_uri`, returning `None` if it was never issued,
    /// already consumed, or expired. Expired/missing entries are still
    /// removed so the map does not grow unboundedly.
    pub fn consume(&self, request_uri: &str) -> Result<PARRequest> {
        let mut requests = self.requests.lock();
        let record = requests
            .remove(request_uri)
            .ok_or_else(|| OAuthError::InvalidRequest("unknown or already-consumed request_uri".to_string()))?;

        if record.is_expired(self.ttl) {
            return Err(OAuthError::InvalidRequest("request_uri expired".to_string()));
        }

        Ok(record)
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }
}
