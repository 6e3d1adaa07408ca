//! AuthorizationCodeStore (C9): one-shot codes with exactly-once
//! consumption and reuse detection (§4.9).

use std::collections::HashMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Duration;
use parking_lot::Mutex;
use rand::RngCore;

use crate::models::{AuthorizationCode, CodeConsumeOutcome};

pub fn random_code() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// In-memory, single-shard authorization code store. §5 models this as a
/// single-writer actor; the `Mutex` here is that actor's mailbox lock —
/// every mutation is serialized and `consume` is atomic end to end.
pub struct AuthorizationCodeStore {
    codes: Mutex<HashMap<String, AuthorizationCode>>,
    ttl: Duration,
}

impl AuthorizationCodeStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            codes: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn put(&self, record: AuthorizationCode) {
        self.codes.lock().insert(record.code.clone(), record);
    }

    /// Atomically consumes `code`: fresh codes are marked used and
    /// returned; already-used codes report their previously issued
    /// `jti` so the caller can revoke it (§4.9, §8 property 1 and S2).
    pub fn consume(&self, code: &str) -> CodeConsumeOutcome {
        let mut codes = self.codes.lock();
        let Some(record) = codes.get_mut(code) else {
            return CodeConsumeOutcome::NotFound;
        };

        if record.used {
            return CodeConsumeOutcome::Reused {
                client_id: record.client_id.clone(),
                sub: record.sub.clone(),
                issued_token_jti: record.issued_token_jti.clone(),
            };
        }

        if record.is_expired(self.ttl) {
            return CodeConsumeOutcome::NotFound;
        }

        record.used = true;
        CodeConsumeOutcome::Fresh(record.clone())
    }

    /// Records which access-token `jti` a freshly consumed code minted, so
    /// a later reuse attempt can name it for revocation.
    pub fn record_issued_token(&self, code: &str, jti: &str) {
        if let Some(record) = self.codes.lock().get_mut(code) {
            record.issued_token_jti = Some(jti.to_string());
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn code(code_value: &str) -> AuthorizationCode {
        AuthorizationCode {
            code: code_value.to_string(),
            client_id: "client-1".to_string(),
            redirect_uri: "https://rp.example/cb".to_string(),
            scope: vec!["openid".to_string()],
            sub: "user-1".to_string(),
            nonce: None,
            code_challenge: None,
            code_challenge_method: None,
            claims_json: None,
            dpop_jkt: None,
            acr: None,
            auth_time: None,
            created_at: Utc::now(),
            used: false,
            issued_token_jti: None,
        }
    }

    #[test]
    fn fresh_code_consumes_exactly_once() {
        let store = AuthorizationCodeStore::new(Duration::seconds(120));
        store.put(code("abc"));

        match store.consume("abc") {
            CodeConsumeOutcome::Fresh(record) => assert_eq!(record.code, "abc"),
            other => panic!("expected Fresh, got {other:?}"),
        }

        match store.consume("abc") {
            CodeConsumeOutcome::Reused { issued_token_jti, .. } => assert!(issued_token_jti.is_none()),
            other => panic!("expected Reused, got {other:?}"),
        }
    }

    #[test]
    fn reuse_reports_previously_issued_jti() {
        let store = AuthorizationCodeStore::new(Duration::seconds(120));
        store.put(code("abc"));
        store.consume("abc");
        store.record_issued_token("abc", "jti-1");

        match store.consume("abc") {
            CodeConsumeOutcome::Reused { issued_token_jti, client_id, sub } => {
                assert_eq!(issued_token_jti.as_deref(), Some("jti-1"));
                assert_eq!(client_id, "client-1");
                assert_eq!(sub, "user-1");
            }
            other => panic!("expected Reused, got {other:?}"),
        }
    }

    #[test]
    fn unknown_code_is_not_found() {
        let store = AuthorizationCodeStore::new(Duration::seconds(120));
        assert!(matches!(store.consume("missing"), CodeConsumeOutcome::NotFound));
    }

    #[test]
    fn expired_code_is_not_found() {
        let store = AuthorizationCodeStore::new(Duration::seconds(-1));
        store.put(code("abc"));
        assert!(matches!(store.consume("abc"), CodeConsumeOutcome::NotFound));
    }
}
