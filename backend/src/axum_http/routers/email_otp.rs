use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use crates::{
    domain::repositories::{
        accounts::AccountRepository, email::EmailSender, sessions::SessionRepository,
        users::UserRepository, verifications::VerificationRepository,
    },
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                accounts::AccountPostgres, users::UserPostgres, verifications::VerificationPostgres,
            },
        },
        mailer::resend::ResendMailer,
    },
};
use serde_json::json;

use crate::{
    axum_http::error_responses::ApiError,
    usecases::email_otp::{
        CheckOtpModel, EmailOtpUseCase, ForgetPasswordModel, ResetPasswordModel,
    },
};

use super::PgSessionService;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    sessions: Arc<PgSessionService>,
    mailer: Arc<ResendMailer>,
) -> Router {
    let email_otp_usecase = EmailOtpUseCase::new(
        Arc::new(UserPostgres::new(Arc::clone(&db_pool))),
        Arc::new(AccountPostgres::new(Arc::clone(&db_pool))),
        Arc::new(VerificationPostgres::new(Arc::clone(&db_pool))),
        mailer,
        sessions,
    );

    router(Arc::new(email_otp_usecase))
}

pub fn router<U, A, S, V, E>(usecase: Arc<EmailOtpUseCase<U, A, S, V, E>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
    E: EmailSender + Send + Sync + 'static,
{
    Router::new()
        .route("/forget-password/email-otp", post(forget_password))
        .route("/email-otp/check-verification-otp", post(check_verification_otp))
        .route("/email-otp/reset-password", post(reset_password))
        .with_state(usecase)
}

pub async fn forget_password<U, A, S, V, E>(
    State(usecase): State<Arc<EmailOtpUseCase<U, A, S, V, E>>>,
    Json(model): Json<ForgetPasswordModel>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
    E: EmailSender + Send + Sync + 'static,
{
    usecase.send_forget_password_otp(model).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn check_verification_otp<U, A, S, V, E>(
    State(usecase): State<Arc<EmailOtpUseCase<U, A, S, V, E>>>,
    Json(model): Json<CheckOtpModel>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
    E: EmailSender + Send + Sync + 'static,
{
    usecase.check_otp(model).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn reset_password<U, A, S, V, E>(
    State(usecase): State<Arc<EmailOtpUseCase<U, A, S, V, E>>>,
    Json(model): Json<ResetPasswordModel>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
    E: EmailSender + Send + Sync + 'static,
{
    usecase.reset_password(model).await?;
    Ok(Json(json!({ "success": true })))
}
