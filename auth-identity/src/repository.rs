use crate::{error::*, models::*};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, session: Session) -> Result<Session>;
    async fn find_by_token(&self, token: &str) -> Result<Option<Session>>;
    async fn delete_session(&self, token: &str) -> Result<()>;
    async fn delete_expired_sessions(&self) -> Result<()>;
}

/// Development/test-only session store. The authorization core never
/// persists resource-owner sessions itself; a deployment supplies its own
/// `SessionRepository` backed by whatever it already uses for login.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create_session(&self, session: Session) -> Result<Session> {
        self.sessions
            .write()
            .insert(session.token.clone(), session.clone());
        Ok(session)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<()> {
        self.sessions.write().remove(token);
        Ok(())
    }

    async fn delete_expired_sessions(&self) -> Result<()> {
        self.sessions.write().retain(|_, s| s.is_valid());
        Ok(())
    }
}
