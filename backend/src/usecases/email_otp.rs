use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use crates::domain::{
    entities::{
        accounts::InsertAccountEntity,
        verifications::{InsertVerificationEntity, VerificationEntity},
    },
    repositories::{
        accounts::AccountRepository, email::EmailSender, sessions::SessionRepository,
        users::UserRepository, verifications::VerificationRepository,
    },
    value_objects::{
        emails::{OTP_VALIDITY_MINUTES, OutgoingEmail},
        otp_types::OtpType,
        validation::{
            ValidationError, normalize_email, validate_email, validate_password,
            validate_six_digit_code,
        },
    },
};
use rand::Rng;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::passwords::hash_password;

use super::sessions::SessionService;

pub const MAX_OTP_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum EmailOtpError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("OTP expired")]
    OtpExpired,
    #[error("Invalid OTP")]
    InvalidOtp,
    #[error("Too many attempts")]
    TooManyAttempts,
    #[error("User not found")]
    UserNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EmailOtpError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EmailOtpError::Validation(_)
            | EmailOtpError::OtpExpired
            | EmailOtpError::InvalidOtp
            | EmailOtpError::UserNotFound => StatusCode::BAD_REQUEST,
            EmailOtpError::TooManyAttempts => StatusCode::FORBIDDEN,
            EmailOtpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, EmailOtpError>;

#[derive(Debug, Clone, Deserialize)]
pub struct ForgetPasswordModel {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckOtpModel {
    pub email: String,
    #[serde(rename = "type")]
    pub otp_type: OtpType,
    pub otp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordModel {
    pub email: String,
    pub otp: String,
    pub password: String,
}

/// Stored verification value: `<otp>:<failed attempts>`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredOtp {
    otp: String,
    attempts: u32,
}

impl StoredOtp {
    fn parse(value: &str) -> Option<Self> {
        let (otp, attempts) = value.rsplit_once(':')?;
        Some(Self {
            otp: otp.to_string(),
            attempts: attempts.parse().ok()?,
        })
    }

    fn encode(&self) -> String {
        format!("{}:{}", self.otp, self.attempts)
    }
}

pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

pub struct EmailOtpUseCase<U, A, S, V, E>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
    E: EmailSender + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    account_repo: Arc<A>,
    verification_repo: Arc<V>,
    email_sender: Arc<E>,
    sessions: Arc<SessionService<S, U>>,
}

impl<U, A, S, V, E> EmailOtpUseCase<U, A, S, V, E>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
    E: EmailSender + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        account_repo: Arc<A>,
        verification_repo: Arc<V>,
        email_sender: Arc<E>,
        sessions: Arc<SessionService<S, U>>,
    ) -> Self {
        Self {
            user_repo,
            account_repo,
            verification_repo,
            email_sender,
            sessions,
        }
    }

    /// Succeeds whether or not the address belongs to a user.
    pub async fn send_forget_password_otp(&self, model: ForgetPasswordModel) -> UseCaseResult<()> {
        validate_email(&model.email)?;
        let email = normalize_email(&model.email);

        let user = self.user_repo.find_by_email(&email).await.map_err(|err| {
            error!(db_error = ?err, "email_otp: failed to look up user");
            EmailOtpError::Internal(err)
        })?;
        if user.is_none() {
            info!("email_otp: reset requested for unknown address, nothing sent");
            return Ok(());
        }

        let otp_type = OtpType::ForgetPassword;
        let otp = generate_otp();
        self.verification_repo
            .upsert(InsertVerificationEntity {
                id: Uuid::new_v4(),
                identifier: otp_type.identifier(&email),
                value: StoredOtp {
                    otp: otp.clone(),
                    attempts: 0,
                }
                .encode(),
                expires_at: Utc::now() + Duration::minutes(OTP_VALIDITY_MINUTES),
            })
            .await
            .map_err(|err| {
                error!(db_error = ?err, "email_otp: failed to store otp");
                EmailOtpError::Internal(err)
            })?;

        let message_id = self
            .email_sender
            .send(OutgoingEmail::one_time_code(&email, &otp, otp_type))
            .await
            .map_err(|err| {
                error!(error = ?err, "email_otp: failed to send otp email");
                EmailOtpError::Internal(err)
            })?;

        info!(%message_id, otp_type = %otp_type, "email_otp: otp sent");
        Ok(())
    }

    /// Checks the code without consuming it.
    pub async fn check_otp(&self, model: CheckOtpModel) -> UseCaseResult<()> {
        let email = normalize_email(&model.email);
        self.verify_otp(&model.otp_type.identifier(&email), &model.otp)
            .await?;
        Ok(())
    }

    pub async fn reset_password(&self, model: ResetPasswordModel) -> UseCaseResult<()> {
        validate_password(&model.password)?;
        let email = normalize_email(&model.email);
        let identifier = OtpType::ForgetPassword.identifier(&email);

        self.verify_otp(&identifier, &model.otp).await?;

        let user = self
            .user_repo
            .find_by_email(&email)
            .await?
            .ok_or(EmailOtpError::UserNotFound)?;

        let password_hash = hash_password(&model.password)?;
        let updated = self
            .account_repo
            .update_password(user.id, &password_hash)
            .await
            .map_err(|err| {
                error!(user_id = %user.id, db_error = ?err, "email_otp: failed to update password");
                EmailOtpError::Internal(err)
            })?;
        if !updated {
            self.account_repo
                .create(InsertAccountEntity::credential(user.id, password_hash))
                .await?;
            info!(user_id = %user.id, "email_otp: credential account created on reset");
        }

        self.verification_repo.delete(&identifier).await?;
        self.sessions.revoke_all(user.id).await?;

        info!(user_id = %user.id, "email_otp: password reset");
        Ok(())
    }

    async fn verify_otp(&self, identifier: &str, input: &str) -> UseCaseResult<VerificationEntity> {
        validate_six_digit_code(input)?;

        let verification = self
            .verification_repo
            .find(identifier)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "email_otp: failed to load otp");
                EmailOtpError::Internal(err)
            })?
            .ok_or(EmailOtpError::InvalidOtp)?;

        if verification.is_expired(Utc::now()) {
            self.verification_repo.delete(identifier).await?;
            return Err(EmailOtpError::OtpExpired);
        }

        let stored = StoredOtp::parse(&verification.value)
            .ok_or_else(|| anyhow::anyhow!("malformed otp value for verification {}", verification.id))?;

        if stored.attempts >= MAX_OTP_ATTEMPTS {
            warn!("email_otp: attempt limit reached, otp discarded");
            self.verification_repo.delete(identifier).await?;
            return Err(EmailOtpError::TooManyAttempts);
        }

        if !bool::from(stored.otp.as_bytes().ct_eq(input.trim().as_bytes())) {
            let next = StoredOtp {
                otp: stored.otp,
                attempts: stored.attempts + 1,
            };
            self.verification_repo
                .update_value(verification.id, &next.encode())
                .await?;
            warn!(attempts = next.attempts, "email_otp: wrong otp");
            return Err(EmailOtpError::InvalidOtp);
        }

        Ok(verification)
    }
}
