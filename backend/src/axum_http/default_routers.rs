use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use tracing::info;

pub async fn not_found() -> impl IntoResponse {
    info!("backend router: not_found handler invoked");
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}

pub async fn health_check() -> impl IntoResponse {
    info!("backend router: health_check handler invoked");
    (StatusCode::OK, "OK").into_response()
}
