use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::stripe_meta::{StripeMeta, StripeMetaPatch};

#[automock]
#[async_trait]
pub trait StripeMetaRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<StripeMeta>>;
    async fn replace(&self, user_id: Uuid, meta: StripeMeta) -> Result<()>;
    /// Returns `false` when no user carries the subscription.
    async fn patch_by_subscription_id(
        &self,
        subscription_id: &str,
        patch: StripeMetaPatch,
    ) -> Result<bool>;
    async fn mark_cancelled(&self, subscription_id: &str, at: DateTime<Utc>) -> Result<bool>;
    async fn set_cancel_at_period_end(&self, user_id: Uuid, cancel_at_period_end: bool)
    -> Result<()>;
}
