use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::sessions::{InsertSessionEntity, SessionEntity};

#[automock]
#[async_trait]
pub trait SessionRepository {
    async fn create(&self, session: InsertSessionEntity) -> Result<SessionEntity>;
    async fn find_valid_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionEntity>>;
    async fn extend(&self, session_id: Uuid, expires_at: DateTime<Utc>) -> Result<()>;
    async fn delete_by_token(&self, token: &str) -> Result<()>;
    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<usize>;
    async fn delete_others_for_user(&self, user_id: Uuid, keep_token: &str) -> Result<usize>;
}
