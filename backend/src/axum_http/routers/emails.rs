use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use crates::{
    domain::repositories::email::EmailSender, infra::mailer::resend::ResendMailer,
};
use serde_json::json;
use tracing::info;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::ApiError,
    usecases::emails::{EmailUseCase, SendEmailModel},
};

pub fn routes(mailer: Arc<ResendMailer>) -> Router {
    router(Arc::new(EmailUseCase::new(mailer)))
}

pub fn router<E>(usecase: Arc<EmailUseCase<E>>) -> Router
where
    E: EmailSender + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(test_configuration).post(send_email))
        .with_state(usecase)
}

pub async fn send_email<E>(
    State(usecase): State<Arc<EmailUseCase<E>>>,
    auth: AuthUser,
    Json(model): Json<SendEmailModel>,
) -> Result<impl IntoResponse, ApiError>
where
    E: EmailSender + Send + Sync + 'static,
{
    let message_id = usecase.send(model).await?;
    info!(user_id = %auth.user_id, %message_id, "emails router: email sent");

    Ok(Json(json!({
        "success": true,
        "messageId": message_id,
        "message": "Email sent successfully",
    })))
}

pub async fn test_configuration<E>(
    State(usecase): State<Arc<EmailUseCase<E>>>,
    _auth: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    E: EmailSender + Send + Sync + 'static,
{
    usecase.test_connection().await?;
    Ok(Json(json!({
        "success": true,
        "message": "Email configuration is working",
    })))
}
