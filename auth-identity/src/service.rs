use crate::{config::*, error::*, models::*, repository::*};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Answers the Authorization Endpoint's "does a usable session exist"
/// question (§4.8 step 10). Registration, password verification, and
/// account management live outside the authorization core.
pub struct IdentityService {
    session_repo: Arc<dyn SessionRepository>,
    config: IdentityConfig,
}

impl IdentityService {
    pub fn new(session_repo: Arc<dyn SessionRepository>, config: IdentityConfig) -> Self {
        Self {
            session_repo,
            config,
        }
    }

    /// Establish a new session for an already-authenticated subject. Called
    /// by whatever interactive login surface a deployment fronts the
    /// authorization core with; the core itself never authenticates
    /// credentials.
    pub async fn create_session(&self, sub: &str, acr: Option<String>) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            sub: sub.to_string(),
            token: Uuid::new_v4().to_string(),
            auth_time: now,
            acr,
            expires_at: now + Duration::minutes(self.config.session_timeout_minutes),
        };
        self.session_repo.create_session(session).await
    }

    /// Look up a session by its opaque token, rejecting it if expired.
    pub async fn validate_session(&self, token: &str) -> Result<Session> {
        let session = self
            .session_repo
            .find_by_token(token)
            .await?
            .ok_or(IdentityError::SessionNotFound)?;

        if !session.is_valid() {
            self.session_repo.delete_session(token).await?;
            return Err(IdentityError::SessionExpired);
        }

        Ok(session)
    }

    pub async fn end_session(&self, token: &str) -> Result<()> {
        self.session_repo.delete_session(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemorySessionRepository;

    fn service() -> IdentityService {
        IdentityService::new(
            Arc::new(InMemorySessionRepository::new()),
            IdentityConfig::default(),
        )
    }

    #[tokio::test]
    async fn created_session_validates() {
        let service = service();
        let session = service
            .create_session("alice", Some("urn:mace:incommon:iap:silver".to_string()))
            .await
            .unwrap();

        let validated = service.validate_session(&session.token).await.unwrap();
        assert_eq!(validated.sub, "alice");
    }

    #[tokio::test]
    async fn missing_token_is_session_not_found() {
        let service = service();
        let err = service.validate_session("does-not-exist").await.unwrap_err();
        assert!(matches!(err, IdentityError::SessionNotFound));
    }

    #[tokio::test]
    async fn ended_session_cannot_be_revalidated() {
        let service = service();
        let session = service.create_session("bob", None).await.unwrap();
        service.end_session(&session.token).await.unwrap();

        let err = service.validate_session(&session.token).await.unwrap_err();
        assert!(matches!(err, IdentityError::SessionNotFound));
    }
}
