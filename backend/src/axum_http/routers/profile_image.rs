use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    response::IntoResponse,
    routing::post,
};
use crates::{
    domain::repositories::storage::ProfileImageStorage, infra::storages::local_fs::LocalFsStorage,
};
use serde_json::json;
use tracing::warn;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::ApiError,
    usecases::profile_image::{MAX_PROFILE_IMAGE_BYTES, ProfileImageUseCase, UploadedImage},
};

const IMAGE_FIELD: &str = "image";
/// Room for the multipart framing around a maximum-size image.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn routes(storage: Arc<LocalFsStorage>) -> Router {
    router(Arc::new(ProfileImageUseCase::new(storage)))
}

pub fn router<S>(usecase: Arc<ProfileImageUseCase<S>>) -> Router
where
    S: ProfileImageStorage + Send + Sync + 'static,
{
    // Well above the image cap so moderately oversized files reach the size check.
    Router::new()
        .route("/", post(upload_profile_image))
        .layer(DefaultBodyLimit::max(
            MAX_PROFILE_IMAGE_BYTES * 2 + MULTIPART_OVERHEAD_BYTES,
        ))
        .with_state(usecase)
}

async fn read_image_field(multipart: &mut Multipart) -> Result<Option<UploadedImage>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|err| {
        warn!(error = %err, "profile image router: malformed multipart body");
        ApiError::BadRequest(err.body_text())
    })? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|err| {
            warn!(error = %err, "profile image router: failed to read image field");
            ApiError::BadRequest(err.body_text())
        })?;

        return Ok(Some(UploadedImage {
            file_name,
            content_type,
            data,
        }));
    }

    Ok(None)
}

pub async fn upload_profile_image<S>(
    State(usecase): State<Arc<ProfileImageUseCase<S>>>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError>
where
    S: ProfileImageStorage + Send + Sync + 'static,
{
    let image = read_image_field(&mut multipart).await?;
    let image_url = usecase.upload(auth.user_id, image).await?;
    Ok(Json(json!({ "imageUrl": image_url })))
}
