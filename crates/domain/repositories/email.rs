use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::emails::OutgoingEmail;

#[automock]
#[async_trait]
pub trait EmailSender {
    /// Returns the provider's message id.
    async fn send(&self, email: OutgoingEmail) -> Result<String>;
    async fn test_connection(&self) -> Result<()>;
}
