use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use crates::domain::{
    entities::{
        two_factors::{InsertTwoFactorEntity, TwoFactorEntity},
        users::UserEntity,
    },
    repositories::{
        accounts::AccountRepository, sessions::SessionRepository,
        two_factors::TwoFactorRepository, users::UserRepository,
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{passwords::verify_password, tokens::validate_two_factor_challenge, totp};

use super::{
    auth::SignedIn,
    sessions::{ClientInfo, SessionService},
};

pub const TOTP_ISSUER: &str = "better-auth";

#[derive(Debug, Error)]
pub enum TwoFactorError {
    #[error("Invalid two factor code")]
    InvalidCode,
    #[error("Invalid two factor cookie")]
    InvalidChallenge,
    #[error("Two factor isn't enabled")]
    NotEnabled,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("User not found")]
    UserNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TwoFactorError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TwoFactorError::InvalidCode | TwoFactorError::InvalidChallenge => {
                StatusCode::UNAUTHORIZED
            }
            TwoFactorError::NotEnabled | TwoFactorError::InvalidPassword => {
                StatusCode::BAD_REQUEST
            }
            TwoFactorError::UserNotFound => StatusCode::NOT_FOUND,
            TwoFactorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, TwoFactorError>;

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordModel {
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeModel {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableTwoFactorDto {
    #[serde(rename = "totpURI")]
    pub totp_uri: String,
    pub backup_codes: Vec<String>,
}

pub struct TwoFactorUseCase<U, A, S, T>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    T: TwoFactorRepository + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    account_repo: Arc<A>,
    two_factor_repo: Arc<T>,
    sessions: Arc<SessionService<S, U>>,
    auth_secret: String,
}

impl<U, A, S, T> TwoFactorUseCase<U, A, S, T>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    T: TwoFactorRepository + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        account_repo: Arc<A>,
        two_factor_repo: Arc<T>,
        sessions: Arc<SessionService<S, U>>,
        auth_secret: String,
    ) -> Self {
        Self {
            user_repo,
            account_repo,
            two_factor_repo,
            sessions,
            auth_secret,
        }
    }

    /// Stores a fresh secret and backup codes. The flag on the user flips only
    /// after the first code is verified.
    pub async fn enable(
        &self,
        user_id: Uuid,
        email: &str,
        password: &str,
    ) -> UseCaseResult<EnableTwoFactorDto> {
        self.check_password(user_id, password).await?;

        let secret = totp::generate_secret();
        let backup_codes = totp::generate_backup_codes();

        self.two_factor_repo
            .upsert(InsertTwoFactorEntity {
                id: Uuid::new_v4(),
                user_id,
                secret: secret.clone(),
                backup_codes: backup_codes.clone(),
            })
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "two_factor: failed to store secret");
                TwoFactorError::Internal(err)
            })?;

        info!(%user_id, "two_factor: setup started");
        Ok(EnableTwoFactorDto {
            totp_uri: totp::totp_uri(&secret, TOTP_ISSUER, email),
            backup_codes,
        })
    }

    /// Confirms setup for a signed-in user.
    pub async fn confirm_totp(&self, user: &UserEntity, code: &str) -> UseCaseResult<()> {
        self.check_totp(user.id, code).await?;

        if !user.two_factor_enabled {
            self.user_repo
                .set_two_factor_enabled(user.id, true)
                .await
                .map_err(|err| {
                    error!(user_id = %user.id, db_error = ?err, "two_factor: failed to enable flag");
                    TwoFactorError::Internal(err)
                })?;
            info!(user_id = %user.id, "two_factor: enabled");
        }
        Ok(())
    }

    /// Second sign-in step: the challenge cookie plus a TOTP code.
    pub async fn sign_in_with_totp(
        &self,
        challenge: Option<&str>,
        code: &str,
        client: ClientInfo,
    ) -> UseCaseResult<SignedIn> {
        let user_id = self.resolve_challenge(challenge)?;
        self.check_totp(user_id, code).await?;
        self.finish_sign_in(user_id, client).await
    }

    pub async fn sign_in_with_backup_code(
        &self,
        challenge: Option<&str>,
        code: &str,
        client: ClientInfo,
    ) -> UseCaseResult<SignedIn> {
        let user_id = self.resolve_challenge(challenge)?;
        let two_factor = self.load(user_id).await?;

        let Some(remaining) = totp::consume_backup_code(&two_factor.backup_codes, code) else {
            warn!(%user_id, "two_factor: backup code rejected");
            return Err(TwoFactorError::InvalidCode);
        };

        self.two_factor_repo
            .update_backup_codes(user_id, remaining)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "two_factor: failed to consume backup code");
                TwoFactorError::Internal(err)
            })?;
        info!(%user_id, "two_factor: backup code consumed");

        self.finish_sign_in(user_id, client).await
    }

    pub async fn generate_backup_codes(
        &self,
        user_id: Uuid,
        password: &str,
    ) -> UseCaseResult<Vec<String>> {
        self.check_password(user_id, password).await?;
        self.load(user_id).await?;

        let codes = totp::generate_backup_codes();
        self.two_factor_repo
            .update_backup_codes(user_id, codes.clone())
            .await?;
        info!(%user_id, "two_factor: backup codes regenerated");
        Ok(codes)
    }

    pub async fn disable(&self, user_id: Uuid, password: &str) -> UseCaseResult<()> {
        self.check_password(user_id, password).await?;

        self.two_factor_repo.delete_by_user(user_id).await?;
        self.user_repo
            .set_two_factor_enabled(user_id, false)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "two_factor: failed to clear flag");
                TwoFactorError::Internal(err)
            })?;
        info!(%user_id, "two_factor: disabled");
        Ok(())
    }

    fn resolve_challenge(&self, challenge: Option<&str>) -> UseCaseResult<Uuid> {
        let challenge = challenge.ok_or(TwoFactorError::InvalidChallenge)?;
        validate_two_factor_challenge(challenge, &self.auth_secret).map_err(|err| {
            warn!(error = %err, "two_factor: challenge rejected");
            TwoFactorError::InvalidChallenge
        })
    }

    async fn load(&self, user_id: Uuid) -> UseCaseResult<TwoFactorEntity> {
        self.two_factor_repo
            .find_by_user(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "two_factor: failed to load secret");
                TwoFactorError::Internal(err)
            })?
            .ok_or(TwoFactorError::NotEnabled)
    }

    async fn check_totp(&self, user_id: Uuid, code: &str) -> UseCaseResult<()> {
        let two_factor = self.load(user_id).await?;
        let now = Utc::now().timestamp().max(0) as u64;

        if totp::verify(&two_factor.secret, code, now) {
            Ok(())
        } else {
            warn!(%user_id, "two_factor: totp code rejected");
            Err(TwoFactorError::InvalidCode)
        }
    }

    async fn check_password(&self, user_id: Uuid, password: &str) -> UseCaseResult<()> {
        let hash = self
            .account_repo
            .find_credential(user_id)
            .await?
            .and_then(|account| account.password_hash)
            .ok_or(TwoFactorError::InvalidPassword)?;

        if verify_password(password, &hash)? {
            Ok(())
        } else {
            warn!(%user_id, "two_factor: password check failed");
            Err(TwoFactorError::InvalidPassword)
        }
    }

    async fn finish_sign_in(&self, user_id: Uuid, client: ClientInfo) -> UseCaseResult<SignedIn> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(TwoFactorError::UserNotFound)?;
        let session = self.sessions.create(user_id, client).await?;
        info!(%user_id, "two_factor: second factor accepted, session created");
        Ok(SignedIn { session, user })
    }
}
