use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::two_factors::{InsertTwoFactorEntity, TwoFactorEntity};

#[automock]
#[async_trait]
pub trait TwoFactorRepository {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<TwoFactorEntity>>;
    async fn upsert(&self, two_factor: InsertTwoFactorEntity) -> Result<()>;
    async fn update_backup_codes(&self, user_id: Uuid, backup_codes: Vec<String>) -> Result<()>;
    async fn delete_by_user(&self, user_id: Uuid) -> Result<()>;
}
