use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::usecases::{
    auth::AuthError, email_otp::EmailOtpError, emails::EmailError,
    profile_image::ProfileImageError, social_login::SocialLoginError,
    subscription_sync::WebhookError, subscriptions::SubscriptionError,
    two_factor::TwoFactorError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Any status with a message that is safe to show the client.
    #[error("{1}")]
    Status(StatusCode, String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Status(status, _) => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let ApiError::Internal(err) = &self {
            error!(error = ?err, "http: request failed with internal error");
        }
        // Internal detail stays in the logs.
        let message = self.to_string();

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Use case errors whose `Internal` variant must not reach the client.
macro_rules! hide_internal_detail {
    ($($error:ident),+ $(,)?) => {
        $(
            impl From<$error> for ApiError {
                fn from(err: $error) -> Self {
                    match err {
                        $error::Internal(err) => ApiError::Internal(err),
                        other => ApiError::Status(other.status_code(), other.to_string()),
                    }
                }
            }
        )+
    };
}

hide_internal_detail!(
    AuthError,
    TwoFactorError,
    EmailOtpError,
    SocialLoginError,
    SubscriptionError,
);

/// These render a fixed, client-safe message for every variant.
macro_rules! expose_message {
    ($($error:ident),+ $(,)?) => {
        $(
            impl From<$error> for ApiError {
                fn from(err: $error) -> Self {
                    ApiError::Status(err.status_code(), err.to_string())
                }
            }
        )+
    };
}

expose_message!(EmailError, WebhookError, ProfileImageError);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    ApiError::Status(status, message.into()).into_response()
}
