use std::sync::Arc;

use axum::http::StatusCode;
use crates::domain::{repositories::email::EmailSender, value_objects::emails::OutgoingEmail};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Missing required fields: type and to")]
    MissingFields,
    #[error("{0}")]
    MissingData(&'static str),
    #[error("Invalid email type")]
    InvalidType,
    #[error("Failed to send email")]
    SendFailed(#[source] anyhow::Error),
    #[error("Email configuration failed")]
    ConfigurationFailed(#[source] anyhow::Error),
}

impl EmailError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EmailError::MissingFields | EmailError::MissingData(_) | EmailError::InvalidType => {
                StatusCode::BAD_REQUEST
            }
            EmailError::SendFailed(_) | EmailError::ConfigurationFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, EmailError>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendEmailModel {
    #[serde(rename = "type")]
    pub email_type: Option<String>,
    pub to: Option<String>,
    #[serde(default)]
    pub data: Value,
}

fn data_str<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Renders the requested template, checking the fields it needs.
pub fn build_email(email_type: &str, to: &str, data: &Value) -> UseCaseResult<OutgoingEmail> {
    match email_type {
        "password-reset" => {
            let link = data_str(data, "resetLink").ok_or(EmailError::MissingData(
                "Missing resetLink for password reset email",
            ))?;
            Ok(OutgoingEmail::password_reset(to, link, data_str(data, "userName")))
        }
        "welcome" => match (data_str(data, "userName"), data_str(data, "loginLink")) {
            (Some(user_name), Some(login_link)) => {
                Ok(OutgoingEmail::welcome(to, user_name, login_link))
            }
            _ => Err(EmailError::MissingData(
                "Missing userName and loginLink for welcome email",
            )),
        },
        "email-verification" => {
            let link = data_str(data, "verificationLink").ok_or(EmailError::MissingData(
                "Missing verificationLink for email verification",
            ))?;
            Ok(OutgoingEmail::email_verification(
                to,
                link,
                data_str(data, "userName"),
            ))
        }
        "custom" => match (data_str(data, "subject"), data_str(data, "html")) {
            (Some(subject), Some(html)) => Ok(OutgoingEmail::custom(
                to,
                subject,
                html,
                data_str(data, "text").map(str::to_string),
            )),
            _ => Err(EmailError::MissingData(
                "Missing subject and html for custom email",
            )),
        },
        _ => Err(EmailError::InvalidType),
    }
}

pub struct EmailUseCase<E>
where
    E: EmailSender + Send + Sync + 'static,
{
    email_sender: Arc<E>,
}

impl<E> EmailUseCase<E>
where
    E: EmailSender + Send + Sync + 'static,
{
    pub fn new(email_sender: Arc<E>) -> Self {
        Self { email_sender }
    }

    /// Returns the provider message id.
    pub async fn send(&self, model: SendEmailModel) -> UseCaseResult<String> {
        let email_type = model
            .email_type
            .filter(|value| !value.is_empty())
            .ok_or(EmailError::MissingFields)?;
        let to = model
            .to
            .filter(|value| !value.is_empty())
            .ok_or(EmailError::MissingFields)?;

        let email = build_email(&email_type, &to, &model.data).map_err(|err| {
            warn!(%email_type, error = %err, "emails: request rejected");
            err
        })?;

        let message_id = self.email_sender.send(email).await.map_err(|err| {
            error!(%email_type, error = ?err, "emails: provider rejected message");
            EmailError::SendFailed(err)
        })?;

        info!(%email_type, %message_id, "emails: message sent");
        Ok(message_id)
    }

    pub async fn test_connection(&self) -> UseCaseResult<()> {
        self.email_sender.test_connection().await.map_err(|err| {
            error!(error = ?err, "emails: configuration check failed");
            EmailError::ConfigurationFailed(err)
        })?;
        info!("emails: configuration check passed");
        Ok(())
    }
}
