use std::sync::Arc;

use axum::http::StatusCode;
use bytes::Bytes;
use crates::domain::repositories::storage::ProfileImageStorage;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const MAX_PROFILE_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const FALLBACK_EXTENSION: &str = "png";

#[derive(Debug, Error)]
pub enum ProfileImageError {
    #[error("No file uploaded")]
    NoFile,
    #[error("File must be an image")]
    NotAnImage,
    #[error("File size must be less than 5MB")]
    TooLarge,
    #[error("Failed to upload image")]
    Internal(#[from] anyhow::Error),
}

impl ProfileImageError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProfileImageError::NoFile
            | ProfileImageError::NotAnImage
            | ProfileImageError::TooLarge => StatusCode::BAD_REQUEST,
            ProfileImageError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, ProfileImageError>;

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Extension from the uploaded name, else from the content type.
pub fn image_extension(file_name: Option<&str>, content_type: &str) -> String {
    let from_name = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return ext;
    }

    mime_guess::get_mime_extensions_str(content_type)
        .and_then(|extensions| extensions.first())
        .map(|ext| ext.to_string())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

pub struct ProfileImageUseCase<S>
where
    S: ProfileImageStorage + Send + Sync + 'static,
{
    storage: Arc<S>,
}

impl<S> ProfileImageUseCase<S>
where
    S: ProfileImageStorage + Send + Sync + 'static,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Returns the public URL of the stored image.
    pub async fn upload(&self, user_id: Uuid, image: Option<UploadedImage>) -> UseCaseResult<String> {
        let image = image.ok_or(ProfileImageError::NoFile)?;

        let content_type = image.content_type.unwrap_or_default();
        if !content_type.starts_with("image/") {
            warn!(%user_id, %content_type, "profile_image: rejected non-image upload");
            return Err(ProfileImageError::NotAnImage);
        }
        if image.data.len() > MAX_PROFILE_IMAGE_BYTES {
            warn!(%user_id, size = image.data.len(), "profile_image: rejected oversized upload");
            return Err(ProfileImageError::TooLarge);
        }

        let file_name = format!(
            "{}.{}",
            Uuid::new_v4(),
            image_extension(image.file_name.as_deref(), &content_type)
        );
        let size = image.data.len();

        let image_url = self
            .storage
            .store_profile_image(&file_name, image.data)
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "profile_image: failed to store image");
                ProfileImageError::Internal(err)
            })?;

        info!(%user_id, size, %image_url, "profile_image: uploaded");
        Ok(image_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::repositories::storage::MockProfileImageStorage;

    fn upload(content_type: &str, size: usize) -> UploadedImage {
        UploadedImage {
            file_name: Some("avatar.JPG".to_string()),
            content_type: Some(content_type.to_string()),
            data: Bytes::from(vec![0u8; size]),
        }
    }

    #[test]
    fn extension_prefers_file_name() {
        assert_eq!(image_extension(Some("me.PNG"), "image/jpeg"), "png");
        assert_eq!(image_extension(None, "image/png"), "png");
        assert_eq!(image_extension(Some("noext"), "application/x-unknown"), "png");
    }

    #[tokio::test]
    async fn missing_file_is_rejected() {
        let err = ProfileImageUseCase::new(Arc::new(MockProfileImageStorage::new()))
            .upload(Uuid::new_v4(), None)
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "No file uploaded");
    }

    #[tokio::test]
    async fn non_images_are_rejected() {
        let mut storage = MockProfileImageStorage::new();
        storage.expect_store_profile_image().never();

        let err = ProfileImageUseCase::new(Arc::new(storage))
            .upload(Uuid::new_v4(), Some(upload("application/pdf", 10)))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "File must be an image");
    }

    #[tokio::test]
    async fn files_over_five_megabytes_are_rejected() {
        let err = ProfileImageUseCase::new(Arc::new(MockProfileImageStorage::new()))
            .upload(
                Uuid::new_v4(),
                Some(upload("image/png", MAX_PROFILE_IMAGE_BYTES + 1)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProfileImageError::TooLarge));
    }

    #[tokio::test]
    async fn stores_under_random_name() {
        let mut storage = MockProfileImageStorage::new();
        storage
            .expect_store_profile_image()
            .withf(|name, data| name.ends_with(".jpg") && name.len() == 36 + 4 && data.len() == 128)
            .times(1)
            .returning(|name, _| Ok(format!("/uploads/profiles/{name}")));

        let url = ProfileImageUseCase::new(Arc::new(storage))
            .upload(Uuid::new_v4(), Some(upload("image/jpeg", 128)))
            .await
            .unwrap();

        assert!(url.starts_with("/uploads/profiles/"));
        assert!(url.ends_with(".jpg"));
    }
}
