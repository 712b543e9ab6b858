use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::accounts::{AccountEntity, InsertAccountEntity};

#[automock]
#[async_trait]
pub trait AccountRepository {
    /// The password-bearing account of a user, if they ever set a password.
    async fn find_credential(&self, user_id: Uuid) -> Result<Option<AccountEntity>>;
    async fn find_by_provider_account(
        &self,
        provider_id: &str,
        account_id: &str,
    ) -> Result<Option<AccountEntity>>;
    async fn create(&self, account: InsertAccountEntity) -> Result<Uuid>;
    /// Returns `false` when the user has no credential account.
    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool>;
}
