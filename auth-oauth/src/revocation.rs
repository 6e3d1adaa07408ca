//! Revoked access-token table (§3 `RevokedAccessToken`), consulted by the
//! UserInfo verifier (C12) and populated by code-reuse handling (C9) and
//! `/revoke` (RFC 7009).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Tracks access-token `jti`s that must be rejected even though their
/// signature and `exp` are otherwise valid. Entries are purged once their
/// own expiry passes, since an expired token is already unusable (§3).
pub struct RevocationTable {
    revoked: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl RevocationTable {
    pub fn new() -> Self {
        Self { revoked: Mutex::new(HashMap::new()) }
    }

    pub fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) {
        self.revoked.lock().insert(jti.to_string(), expires_at);
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        let mut revoked = self.revoked.lock();
        self.sweep(&mut revoked);
        revoked.contains_key(jti)
    }

    fn sweep(&self, revoked: &mut HashMap<String, DateTime<Utc>>) {
        let now = Utc::now();
        revoked.retain(|_, expires_at| *expires_at > now);
    }
}

impl Default for RevocationTable {
    fn default() -> Self {
        Self::new()
    }
}
