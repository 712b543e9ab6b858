use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use crates::domain::{
    entities::{
        accounts::InsertAccountEntity,
        sessions::SessionEntity,
        users::{InsertUserEntity, UpdateUserProfileEntity, UserEntity},
    },
    repositories::{
        accounts::AccountRepository, sessions::SessionRepository, users::UserRepository,
    },
    value_objects::validation::{
        ValidationError, normalize_email, validate_email, validate_name, validate_password,
    },
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{
    passwords::{hash_password, verify_password},
    tokens::issue_two_factor_challenge,
};

use super::sessions::{ClientInfo, SessionService};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("User already exists")]
    UserAlreadyExists,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("Credential account not found")]
    CredentialAccountNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::CredentialAccountNotFound => {
                StatusCode::BAD_REQUEST
            }
            AuthError::InvalidPassword => StatusCode::BAD_REQUEST,
            AuthError::UserAlreadyExists => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpEmailModel {
    pub name: String,
    pub email: String,
    pub password: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInEmailModel {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserModel {
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordModel {
    pub current_password: String,
    pub new_password: String,
    #[serde(default)]
    pub revoke_other_sessions: bool,
}

/// A freshly issued session together with its owner.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub session: SessionEntity,
    pub user: UserEntity,
}

#[derive(Debug, Clone)]
pub enum SignInOutcome {
    SignedIn(SignedIn),
    /// Password accepted; a second factor is needed. Carries the signed challenge.
    TwoFactorRequired { challenge: String },
}

pub struct AuthUseCase<U, A, S>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    account_repo: Arc<A>,
    sessions: Arc<SessionService<S, U>>,
    auth_secret: String,
}

impl<U, A, S> AuthUseCase<U, A, S>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        account_repo: Arc<A>,
        sessions: Arc<SessionService<S, U>>,
        auth_secret: String,
    ) -> Self {
        Self {
            user_repo,
            account_repo,
            sessions,
            auth_secret,
        }
    }

    pub async fn sign_up_email(
        &self,
        model: SignUpEmailModel,
        client: ClientInfo,
    ) -> UseCaseResult<SignedIn> {
        validate_name(&model.name)?;
        validate_email(&model.email)?;
        validate_password(&model.password)?;
        let email = normalize_email(&model.email);

        let existing = self.user_repo.find_by_email(&email).await.map_err(|err| {
            error!(db_error = ?err, "auth: failed to check existing user");
            AuthError::Internal(err)
        })?;
        if existing.is_some() {
            warn!("auth: sign up rejected, email already registered");
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password(&model.password)?;

        let user = self
            .user_repo
            .create(InsertUserEntity {
                id: Uuid::new_v4(),
                name: model.name.trim().to_string(),
                email,
                email_verified: false,
                image: model.image.filter(|image| !image.is_empty()),
            })
            .await
            .map_err(|err| {
                error!(db_error = ?err, "auth: failed to create user");
                AuthError::Internal(err)
            })?;

        self.account_repo
            .create(InsertAccountEntity::credential(user.id, password_hash))
            .await
            .map_err(|err| {
                error!(user_id = %user.id, db_error = ?err, "auth: failed to create credential account");
                AuthError::Internal(err)
            })?;

        let session = self.sessions.create(user.id, client).await?;
        info!(user_id = %user.id, "auth: user signed up");

        Ok(SignedIn { session, user })
    }

    pub async fn sign_in_email(
        &self,
        model: SignInEmailModel,
        client: ClientInfo,
    ) -> UseCaseResult<SignInOutcome> {
        let email = normalize_email(&model.email);

        let user = self
            .user_repo
            .find_by_email(&email)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "auth: failed to load user for sign in");
                AuthError::Internal(err)
            })?
            .ok_or(AuthError::InvalidCredentials)?;

        let account = self
            .account_repo
            .find_credential(user.id)
            .await
            .map_err(|err| {
                error!(user_id = %user.id, db_error = ?err, "auth: failed to load credential account");
                AuthError::Internal(err)
            })?;

        let Some(password_hash) = account.and_then(|account| account.password_hash) else {
            warn!(user_id = %user.id, "auth: sign in attempted on account without password");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(&model.password, &password_hash)? {
            warn!(user_id = %user.id, "auth: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if user.two_factor_enabled {
            let challenge = issue_two_factor_challenge(user.id, &self.auth_secret, Utc::now())?;
            info!(user_id = %user.id, "auth: password accepted, awaiting second factor");
            return Ok(SignInOutcome::TwoFactorRequired { challenge });
        }

        let session = self.sessions.create(user.id, client).await?;
        info!(user_id = %user.id, remember_me = ?model.remember_me, "auth: user signed in");

        Ok(SignInOutcome::SignedIn(SignedIn { session, user }))
    }

    pub async fn sign_out(&self, session_token: &str) -> UseCaseResult<()> {
        self.sessions.revoke(session_token).await.map_err(|err| {
            error!(db_error = ?err, "auth: failed to revoke session");
            AuthError::Internal(err)
        })
    }

    pub async fn update_user(&self, user_id: Uuid, model: UpdateUserModel) -> UseCaseResult<()> {
        if let Some(name) = &model.name {
            validate_name(name)?;
        }

        let changes = UpdateUserProfileEntity {
            name: model.name.map(|name| name.trim().to_string()),
            image: model.image,
            updated_at: None,
        };
        if changes == UpdateUserProfileEntity::default() {
            return Ok(());
        }

        self.user_repo
            .update_profile(user_id, changes)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "auth: failed to update profile");
                AuthError::Internal(err)
            })?;

        info!(%user_id, "auth: profile updated");
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        session_token: &str,
        model: ChangePasswordModel,
    ) -> UseCaseResult<()> {
        validate_password(&model.new_password)?;

        let account = self
            .account_repo
            .find_credential(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "auth: failed to load credential account");
                AuthError::Internal(err)
            })?
            .ok_or(AuthError::CredentialAccountNotFound)?;

        let Some(current_hash) = account.password_hash else {
            return Err(AuthError::CredentialAccountNotFound);
        };
        if !verify_password(&model.current_password, &current_hash)? {
            warn!(%user_id, "auth: change password rejected, wrong current password");
            return Err(AuthError::InvalidPassword);
        }

        let new_hash = hash_password(&model.new_password)?;
        self.account_repo
            .update_password(user_id, &new_hash)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "auth: failed to store new password");
                AuthError::Internal(err)
            })?;

        if model.revoke_other_sessions {
            self.sessions.revoke_others(user_id, session_token).await?;
        }

        info!(%user_id, "auth: password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::validate_two_factor_challenge;
    use crate::usecases::sessions::{
        SessionSettings,
        test_support::{session_for, user},
    };
    use chrono::Utc;
    use crates::domain::{
        entities::accounts::AccountEntity,
        repositories::{
            accounts::MockAccountRepository, sessions::MockSessionRepository,
            users::MockUserRepository,
        },
    };

    const SECRET: &str = "test-auth-secret";

    fn credential(user_id: Uuid, password: &str) -> AccountEntity {
        let now = Utc::now();
        AccountEntity {
            id: Uuid::new_v4(),
            user_id,
            provider_id: "credential".to_string(),
            account_id: user_id.to_string(),
            password_hash: Some(hash_password(password).unwrap()),
            access_token: None,
            scope: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn usecase(
        users: MockUserRepository,
        accounts: MockAccountRepository,
        sessions: MockSessionRepository,
    ) -> AuthUseCase<MockUserRepository, MockAccountRepository, MockSessionRepository> {
        let users = Arc::new(users);
        let sessions = SessionService::new(
            Arc::new(sessions),
            Arc::clone(&users),
            SessionSettings::from_secs(604_800, 86_400),
        );
        AuthUseCase::new(users, Arc::new(accounts), Arc::new(sessions), SECRET.to_string())
    }

    #[tokio::test]
    async fn sign_up_rejects_existing_email() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .withf(|email| email == "jane@example.com")
            .returning(|email| Ok(Some(user(email))));
        users.expect_create().never();

        let result = usecase(users, MockAccountRepository::new(), MockSessionRepository::new())
            .sign_up_email(
                SignUpEmailModel {
                    name: "Jane".to_string(),
                    email: " Jane@Example.com ".to_string(),
                    password: "Secret1!".to_string(),
                    image: None,
                },
                ClientInfo::default(),
            )
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn sign_up_rejects_weak_password_before_touching_storage() {
        let result = usecase(
            MockUserRepository::new(),
            MockAccountRepository::new(),
            MockSessionRepository::new(),
        )
        .sign_up_email(
            SignUpEmailModel {
                name: "Jane".to_string(),
                email: "jane@example.com".to_string(),
                password: "password".to_string(),
                image: None,
            },
            ClientInfo::default(),
        )
        .await;

        assert!(matches!(
            result,
            Err(AuthError::Validation(ValidationError::WeakPassword))
        ));
    }

    #[tokio::test]
    async fn sign_up_creates_user_credential_and_session() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(|_| Ok(None));
        users.expect_create().times(1).returning(|insert| {
            let mut created = user(&insert.email);
            created.id = insert.id;
            created.name = insert.name;
            Ok(created)
        });

        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_create()
            .withf(|account| {
                account.provider_id == "credential"
                    && account
                        .password_hash
                        .as_deref()
                        .is_some_and(|hash| hash.starts_with("$argon2"))
            })
            .times(1)
            .returning(|account| Ok(account.id));

        let mut sessions = MockSessionRepository::new();
        sessions.expect_create().times(1).returning(|insert| {
            let mut session = session_for(insert.user_id);
            session.token = insert.token;
            Ok(session)
        });

        let signed_in = usecase(users, accounts, sessions)
            .sign_up_email(
                SignUpEmailModel {
                    name: " Jane ".to_string(),
                    email: "Jane@Example.com".to_string(),
                    password: "Secret1!".to_string(),
                    image: None,
                },
                ClientInfo::default(),
            )
            .await
            .unwrap();

        assert_eq!(signed_in.user.email, "jane@example.com");
        assert_eq!(signed_in.user.name, "Jane");
        assert_eq!(signed_in.session.token.len(), 32);
    }

    #[tokio::test]
    async fn sign_in_with_wrong_password_is_unauthorized() {
        let owner = user("jane@example.com");
        let user_id = owner.id;

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(owner.clone())));

        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_find_credential()
            .returning(move |_| Ok(Some(credential(user_id, "Secret1!"))));

        let mut sessions = MockSessionRepository::new();
        sessions.expect_create().never();

        let result = usecase(users, accounts, sessions)
            .sign_in_email(
                SignInEmailModel {
                    email: "jane@example.com".to_string(),
                    password: "Wrong1!x".to_string(),
                    remember_me: None,
                },
                ClientInfo::default(),
            )
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn sign_in_for_unknown_email_is_unauthorized() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(|_| Ok(None));

        let result = usecase(users, MockAccountRepository::new(), MockSessionRepository::new())
            .sign_in_email(
                SignInEmailModel {
                    email: "ghost@example.com".to_string(),
                    password: "Secret1!".to_string(),
                    remember_me: None,
                },
                ClientInfo::default(),
            )
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn sign_in_with_two_factor_returns_challenge_instead_of_session() {
        let mut owner = user("jane@example.com");
        owner.two_factor_enabled = true;
        let user_id = owner.id;

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(owner.clone())));

        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_find_credential()
            .returning(move |_| Ok(Some(credential(user_id, "Secret1!"))));

        let mut sessions = MockSessionRepository::new();
        sessions.expect_create().never();

        let outcome = usecase(users, accounts, sessions)
            .sign_in_email(
                SignInEmailModel {
                    email: "jane@example.com".to_string(),
                    password: "Secret1!".to_string(),
                    remember_me: Some(true),
                },
                ClientInfo::default(),
            )
            .await
            .unwrap();

        match outcome {
            SignInOutcome::TwoFactorRequired { challenge } => {
                assert_eq!(validate_two_factor_challenge(&challenge, SECRET).unwrap(), user_id);
            }
            SignInOutcome::SignedIn(_) => panic!("expected a two factor challenge"),
        }
    }

    #[tokio::test]
    async fn change_password_revokes_other_sessions_when_asked() {
        let user_id = Uuid::new_v4();

        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_find_credential()
            .returning(move |_| Ok(Some(credential(user_id, "Secret1!"))));
        accounts
            .expect_update_password()
            .times(1)
            .returning(|_, _| Ok(true));

        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_delete_others_for_user()
            .withf(move |id, keep| *id == user_id && keep == "current-token")
            .times(1)
            .returning(|_, _| Ok(2));

        usecase(MockUserRepository::new(), accounts, sessions)
            .change_password(
                user_id,
                "current-token",
                ChangePasswordModel {
                    current_password: "Secret1!".to_string(),
                    new_password: "Secret2@".to_string(),
                    revoke_other_sessions: true,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_user_without_changes_is_a_no_op() {
        let mut users = MockUserRepository::new();
        users.expect_update_profile().never();

        usecase(users, MockAccountRepository::new(), MockSessionRepository::new())
            .update_user(
                Uuid::new_v4(),
                UpdateUserModel {
                    name: None,
                    image: None,
                },
            )
            .await
            .unwrap();
    }
}
