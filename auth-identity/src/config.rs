use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub session_timeout_minutes: i64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            session_timeout_minutes: 60,
        }
    }
}
