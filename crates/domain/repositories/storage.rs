use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use mockall::automock;

#[automock]
#[async_trait]
pub trait ProfileImageStorage {
    /// Persists the image and returns its public URL path.
    async fn store_profile_image(&self, file_name: &str, data: Bytes) -> Result<String>;
}
