use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::users::{InsertUserEntity, UpdateUserProfileEntity, UserEntity};

#[automock]
#[async_trait]
pub trait UserRepository {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserEntity>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>>;
    async fn create(&self, user: InsertUserEntity) -> Result<UserEntity>;
    async fn update_profile(&self, user_id: Uuid, changes: UpdateUserProfileEntity) -> Result<()>;
    async fn set_two_factor_enabled(&self, user_id: Uuid, enabled: bool) -> Result<()>;
    async fn set_email_verified(&self, user_id: Uuid, verified: bool) -> Result<()>;
    async fn set_stripe_customer_id(&self, user_id: Uuid, customer_id: &str) -> Result<()>;
}
