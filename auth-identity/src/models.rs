use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A resource owner's authenticated session, as consulted by the
/// Authorization Endpoint (§4.8 step 10) to decide whether the request can
/// proceed silently or must be sent to interactive login (out of scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub sub: String,
    pub token: String,
    pub auth_time: DateTime<Utc>,
    pub acr: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }

    /// Whether this session satisfies a `max_age` constraint expressed in
    /// seconds, per §4.8 step 7.
    pub fn satisfies_max_age(&self, max_age: Option<i64>) -> bool {
        match max_age {
            None => true,
            Some(seconds) => (Utc::now() - self.auth_time).num_seconds() <= seconds,
        }
    }
}
