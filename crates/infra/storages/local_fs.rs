use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use crate::domain::repositories::storage::ProfileImageStorage;

pub const PROFILE_IMAGE_DIR: &str = "profiles";
pub const PUBLIC_UPLOADS_PREFIX: &str = "/uploads";

/// Stores uploads on local disk; the directory is served under `/uploads`.
pub struct LocalFsStorage {
    root: PathBuf,
}

impl LocalFsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ProfileImageStorage for LocalFsStorage {
    async fn store_profile_image(&self, file_name: &str, data: Bytes) -> Result<String> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            anyhow::bail!("refusing to store profile image under unsafe name {file_name:?}");
        }

        let dir = self.root.join(PROFILE_IMAGE_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create upload dir {}", dir.display()))?;

        let path = dir.join(file_name);
        let size = data.len();
        tokio::fs::write(&path, &data)
            .await
            .with_context(|| format!("failed to write profile image {}", path.display()))?;

        info!(file = %path.display(), size, "storage: profile image stored");

        Ok(format!("{PUBLIC_UPLOADS_PREFIX}/{PROFILE_IMAGE_DIR}/{file_name}"))
    }
}
