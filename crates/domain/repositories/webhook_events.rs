use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

#[automock]
#[async_trait]
pub trait WebhookEventRepository {
    async fn is_processed(&self, event_id: &str) -> Result<bool>;
    async fn mark_processed(&self, event_id: &str, event_type: &str) -> Result<()>;
    /// Returns the number of rows removed.
    async fn delete_processed_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
