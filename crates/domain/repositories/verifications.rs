use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::verifications::{InsertVerificationEntity, VerificationEntity};

/// Short-lived values keyed by identifier: OTPs and OAuth state.
#[automock]
#[async_trait]
pub trait VerificationRepository {
    /// Replaces any existing value stored under the same identifier.
    async fn upsert(&self, verification: InsertVerificationEntity) -> Result<()>;
    async fn find(&self, identifier: &str) -> Result<Option<VerificationEntity>>;
    async fn update_value(&self, verification_id: Uuid, value: &str) -> Result<()>;
    async fn delete(&self, identifier: &str) -> Result<()>;
}
