use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use crates::domain::{
    entities::sessions::{InsertSessionEntity, SessionEntity},
    repositories::{sessions::SessionRepository, users::UserRepository},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{CurrentSession, tokens::generate_session_token};

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub expires_in: Duration,
    /// A session is refreshed once it is older than this since the last refresh.
    pub update_age: Duration,
}

impl SessionSettings {
    pub fn from_secs(expires_in_secs: i64, update_age_secs: i64) -> Self {
        Self {
            expires_in: Duration::seconds(expires_in_secs),
            update_age: Duration::seconds(update_age_secs),
        }
    }
}

/// Request metadata recorded on new sessions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub struct SessionService<S, U>
where
    S: SessionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    session_repo: Arc<S>,
    user_repo: Arc<U>,
    settings: SessionSettings,
}

impl<S, U> SessionService<S, U>
where
    S: SessionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    pub fn new(session_repo: Arc<S>, user_repo: Arc<U>, settings: SessionSettings) -> Self {
        Self {
            session_repo,
            user_repo,
            settings,
        }
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub async fn create(&self, user_id: Uuid, client: ClientInfo) -> Result<SessionEntity> {
        let session = self
            .session_repo
            .create(InsertSessionEntity {
                id: Uuid::new_v4(),
                user_id,
                token: generate_session_token(),
                expires_at: Utc::now() + self.settings.expires_in,
                ip_address: client.ip_address,
                user_agent: client.user_agent,
            })
            .await
            .context("failed to create session")?;

        info!(%user_id, session_id = %session.id, "sessions: session created");
        Ok(session)
    }

    /// Looks up a live session and its user, sliding the expiry forward when due.
    pub async fn resolve(&self, token: &str) -> Result<Option<CurrentSession>> {
        let now = Utc::now();
        let Some(mut session) = self.session_repo.find_valid_by_token(token, now).await? else {
            debug!("sessions: token did not match a live session");
            return Ok(None);
        };

        let Some(user) = self.user_repo.find_by_id(session.user_id).await? else {
            warn!(
                user_id = %session.user_id,
                session_id = %session.id,
                "sessions: session belongs to a missing user"
            );
            return Ok(None);
        };

        if self.needs_refresh(&session, now) {
            let expires_at = now + self.settings.expires_in;
            self.session_repo.extend(session.id, expires_at).await?;
            debug!(session_id = %session.id, "sessions: session expiry extended");
            session.expires_at = expires_at;
            session.updated_at = now;
        }

        Ok(Some(CurrentSession { user, session }))
    }

    fn needs_refresh(&self, session: &SessionEntity, now: DateTime<Utc>) -> bool {
        session.updated_at + self.settings.update_age <= now
    }

    pub async fn revoke(&self, token: &str) -> Result<()> {
        self.session_repo.delete_by_token(token).await
    }

    pub async fn revoke_all(&self, user_id: Uuid) -> Result<usize> {
        let revoked = self.session_repo.delete_all_for_user(user_id).await?;
        info!(%user_id, revoked, "sessions: all sessions revoked");
        Ok(revoked)
    }

    pub async fn revoke_others(&self, user_id: Uuid, keep_token: &str) -> Result<usize> {
        let revoked = self
            .session_repo
            .delete_others_for_user(user_id, keep_token)
            .await?;
        info!(%user_id, revoked, "sessions: other sessions revoked");
        Ok(revoked)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use crates::domain::entities::{sessions::SessionEntity, users::UserEntity};
    use uuid::Uuid;

    pub fn user(email: &str) -> UserEntity {
        let now = Utc::now();
        UserEntity {
            id: Uuid::new_v4(),
            name: "Jane Doe".to_string(),
            email: email.to_string(),
            email_verified: false,
            image: None,
            two_factor_enabled: false,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            stripe_meta: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn session_for(user_id: Uuid) -> SessionEntity {
        let now = Utc::now();
        SessionEntity {
            id: Uuid::new_v4(),
            user_id,
            token: "session-token".to_string(),
            expires_at: now + chrono::Duration::days(7),
            ip_address: None,
            user_agent: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{session_for, user};
    use super::*;
    use crates::domain::repositories::{sessions::MockSessionRepository, users::MockUserRepository};

    fn settings() -> SessionSettings {
        SessionSettings::from_secs(7 * 86_400, 86_400)
    }

    #[tokio::test]
    async fn resolve_returns_none_for_unknown_token() {
        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_find_valid_by_token()
            .returning(|_, _| Ok(None));
        let users = MockUserRepository::new();

        let service = SessionService::new(Arc::new(sessions), Arc::new(users), settings());
        assert!(service.resolve("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolve_extends_sessions_older_than_update_age() {
        let owner = user("jane@example.com");
        let user_id = owner.id;
        let mut stale = session_for(user_id);
        stale.updated_at = Utc::now() - Duration::days(2);

        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_find_valid_by_token()
            .returning(move |_, _| Ok(Some(stale.clone())));
        sessions.expect_extend().times(1).returning(|_, _| Ok(()));

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(owner.clone())));

        let service = SessionService::new(Arc::new(sessions), Arc::new(users), settings());
        let current = service.resolve("session-token").await.unwrap().unwrap();

        assert_eq!(current.user.id, user_id);
        assert!(current.session.expires_at > Utc::now() + Duration::days(6));
    }

    #[tokio::test]
    async fn resolve_leaves_fresh_sessions_alone() {
        let owner = user("jane@example.com");
        let fresh = session_for(owner.id);

        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_find_valid_by_token()
            .returning(move |_, _| Ok(Some(fresh.clone())));
        sessions.expect_extend().never();

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(owner.clone())));

        let service = SessionService::new(Arc::new(sessions), Arc::new(users), settings());
        assert!(service.resolve("session-token").await.unwrap().is_some());
    }
}
