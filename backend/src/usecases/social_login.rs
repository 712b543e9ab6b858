use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use crates::domain::{
    entities::{
        accounts::InsertAccountEntity, users::InsertUserEntity,
        verifications::InsertVerificationEntity,
    },
    repositories::{
        accounts::AccountRepository, sessions::SessionRepository,
        social_identity::SocialIdentityProvider, users::UserRepository,
        verifications::VerificationRepository,
    },
    value_objects::{
        social_providers::{SocialProfile, SocialProvider},
        validation::normalize_email,
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::tokens::generate_state;

use super::{
    auth::SignedIn,
    sessions::{ClientInfo, SessionService},
};

pub const OAUTH_STATE_TTL_MINUTES: i64 = 10;
const DEFAULT_CALLBACK_URL: &str = "/";

#[derive(Debug, Error)]
pub enum SocialLoginError {
    #[error("Provider not found")]
    UnknownProvider,
    #[error("Provider is not configured")]
    ProviderNotConfigured,
    #[error("Invalid or expired state")]
    InvalidState,
    #[error("Provider did not return an email address")]
    EmailNotFound,
    #[error("Account is not linked")]
    AccountNotLinked,
    #[error("Failed to exchange the authorization code")]
    CodeExchangeFailed(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SocialLoginError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SocialLoginError::UnknownProvider | SocialLoginError::ProviderNotConfigured => {
                StatusCode::BAD_REQUEST
            }
            SocialLoginError::InvalidState
            | SocialLoginError::EmailNotFound
            | SocialLoginError::AccountNotLinked
            | SocialLoginError::CodeExchangeFailed(_) => StatusCode::UNAUTHORIZED,
            SocialLoginError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short code appended to the login page redirect.
    pub fn error_code(&self) -> &'static str {
        match self {
            SocialLoginError::UnknownProvider => "provider_not_found",
            SocialLoginError::ProviderNotConfigured => "provider_not_configured",
            SocialLoginError::InvalidState => "state_mismatch",
            SocialLoginError::EmailNotFound => "email_not_found",
            SocialLoginError::AccountNotLinked => "account_not_linked",
            SocialLoginError::CodeExchangeFailed(_) => "oauth_code_exchange_failed",
            SocialLoginError::Internal(_) => "internal_error",
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SocialLoginError>;

#[derive(Debug, Clone, Deserialize)]
pub struct SignInSocialModel {
    pub provider: String,
    #[serde(rename = "callbackURL")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct OAuthState {
    provider: SocialProvider,
    #[serde(rename = "callbackURL")]
    callback_url: String,
}

fn state_identifier(state: &str) -> String {
    format!("oauth-state-{state}")
}

/// Only same-site relative paths are followed after sign in.
/// Browsers read `\` as `/` and drop tabs and newlines, so `/\host` and
/// `/\t/host` would still leave the site.
fn is_same_site_path(url: &str) -> bool {
    url.starts_with('/')
        && !url.starts_with("//")
        && !url.contains('\\')
        && !url.chars().any(|c| c.is_ascii_control())
}

fn sanitize_callback_url(callback_url: Option<String>) -> String {
    callback_url
        .filter(|url| is_same_site_path(url))
        .unwrap_or_else(|| DEFAULT_CALLBACK_URL.to_string())
}

pub struct SocialLoginUseCase<U, A, S, V, P>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
    P: SocialIdentityProvider + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    account_repo: Arc<A>,
    verification_repo: Arc<V>,
    identity_provider: Arc<P>,
    sessions: Arc<SessionService<S, U>>,
    auth_base_url: String,
}

impl<U, A, S, V, P> SocialLoginUseCase<U, A, S, V, P>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
    P: SocialIdentityProvider + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        account_repo: Arc<A>,
        verification_repo: Arc<V>,
        identity_provider: Arc<P>,
        sessions: Arc<SessionService<S, U>>,
        auth_base_url: String,
    ) -> Self {
        Self {
            user_repo,
            account_repo,
            verification_repo,
            identity_provider,
            sessions,
            auth_base_url: auth_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn redirect_uri(&self, provider: SocialProvider) -> String {
        format!("{}/api/auth/callback/{}", self.auth_base_url, provider)
    }

    /// Returns the provider authorization URL the browser should follow.
    pub async fn start(&self, model: SignInSocialModel) -> UseCaseResult<String> {
        let provider =
            SocialProvider::parse(&model.provider).ok_or(SocialLoginError::UnknownProvider)?;
        if !self.identity_provider.is_configured(provider) {
            warn!(%provider, "social_login: provider requested but not configured");
            return Err(SocialLoginError::ProviderNotConfigured);
        }

        let state = generate_state();
        let value = serde_json::to_string(&OAuthState {
            provider,
            callback_url: sanitize_callback_url(model.callback_url),
        })
        .map_err(anyhow::Error::from)?;

        self.verification_repo
            .upsert(InsertVerificationEntity {
                id: Uuid::new_v4(),
                identifier: state_identifier(&state),
                value,
                expires_at: Utc::now() + Duration::minutes(OAUTH_STATE_TTL_MINUTES),
            })
            .await
            .map_err(|err| {
                error!(%provider, db_error = ?err, "social_login: failed to store state");
                SocialLoginError::Internal(err)
            })?;

        let url = self.identity_provider.authorization_url(
            provider,
            &state,
            &self.redirect_uri(provider),
        )?;
        info!(%provider, "social_login: authorization started");
        Ok(url)
    }

    /// Completes the authorization code flow. Returns the new session and the
    /// URL to send the browser to.
    pub async fn callback(
        &self,
        provider: &str,
        code: &str,
        state: &str,
        client: ClientInfo,
    ) -> UseCaseResult<(SignedIn, String)> {
        let provider = SocialProvider::parse(provider).ok_or(SocialLoginError::UnknownProvider)?;
        let stored = self.consume_state(provider, state).await?;

        let profile = self
            .identity_provider
            .fetch_profile(provider, code, &self.redirect_uri(provider))
            .await
            .map_err(|err| {
                warn!(%provider, error = ?err, "social_login: code exchange failed");
                SocialLoginError::CodeExchangeFailed(err)
            })?;

        let user_id = self.find_or_create_user(&profile).await?;
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {user_id} vanished during social sign in"))?;

        let session = self.sessions.create(user.id, client).await?;
        info!(user_id = %user.id, %provider, "social_login: user signed in");

        Ok((SignedIn { session, user }, stored.callback_url))
    }

    async fn consume_state(
        &self,
        provider: SocialProvider,
        state: &str,
    ) -> UseCaseResult<OAuthState> {
        if state.is_empty() {
            return Err(SocialLoginError::InvalidState);
        }

        let identifier = state_identifier(state);
        let verification = self
            .verification_repo
            .find(&identifier)
            .await?
            .ok_or(SocialLoginError::InvalidState)?;
        self.verification_repo.delete(&identifier).await?;

        if verification.is_expired(Utc::now()) {
            warn!(%provider, "social_login: state expired");
            return Err(SocialLoginError::InvalidState);
        }

        let stored: OAuthState = serde_json::from_str(&verification.value).map_err(|err| {
            warn!(%provider, error = ?err, "social_login: unreadable state payload");
            SocialLoginError::InvalidState
        })?;
        if stored.provider != provider {
            warn!(%provider, expected = %stored.provider, "social_login: state issued for another provider");
            return Err(SocialLoginError::InvalidState);
        }

        Ok(stored)
    }

    async fn find_or_create_user(&self, profile: &SocialProfile) -> UseCaseResult<Uuid> {
        let provider_id = profile.provider.as_str();

        if let Some(account) = self
            .account_repo
            .find_by_provider_account(provider_id, &profile.account_id)
            .await?
        {
            return Ok(account.user_id);
        }

        let email = profile
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|email| !email.is_empty())
            .ok_or(SocialLoginError::EmailNotFound)?;

        let user_id = match self.user_repo.find_by_email(&email).await? {
            Some(existing) => {
                if !profile.email_verified {
                    warn!(
                        user_id = %existing.id,
                        provider = provider_id,
                        "social_login: refusing to link unverified provider email"
                    );
                    return Err(SocialLoginError::AccountNotLinked);
                }
                if !existing.email_verified {
                    self.user_repo.set_email_verified(existing.id, true).await?;
                }
                info!(user_id = %existing.id, provider = provider_id, "social_login: linking provider account");
                existing.id
            }
            None => {
                let created = self
                    .user_repo
                    .create(InsertUserEntity {
                        id: Uuid::new_v4(),
                        name: profile.display_name(),
                        email,
                        email_verified: profile.email_verified,
                        image: profile.image.clone(),
                    })
                    .await
                    .map_err(|err| {
                        error!(provider = provider_id, db_error = ?err, "social_login: failed to create user");
                        SocialLoginError::Internal(err)
                    })?;
                info!(user_id = %created.id, provider = provider_id, "social_login: user created");
                created.id
            }
        };

        self.account_repo
            .create(InsertAccountEntity {
                id: Uuid::new_v4(),
                user_id,
                provider_id: provider_id.to_string(),
                account_id: profile.account_id.clone(),
                password_hash: None,
                access_token: Some(profile.access_token.clone()),
                scope: profile.scope.clone(),
            })
            .await
            .map_err(|err| {
                error!(%user_id, provider = provider_id, db_error = ?err, "social_login: failed to store account");
                SocialLoginError::Internal(err)
            })?;

        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::sessions::{
        SessionSettings,
        test_support::{session_for, user},
    };
    use crates::domain::{
        entities::{accounts::AccountEntity, verifications::VerificationEntity},
        repositories::{
            accounts::MockAccountRepository, sessions::MockSessionRepository,
            social_identity::MockSocialIdentityProvider, users::MockUserRepository,
            verifications::MockVerificationRepository,
        },
    };

    type TestUseCase = SocialLoginUseCase<
        MockUserRepository,
        MockAccountRepository,
        MockSessionRepository,
        MockVerificationRepository,
        MockSocialIdentityProvider,
    >;

    fn usecase(
        users: MockUserRepository,
        accounts: MockAccountRepository,
        sessions: MockSessionRepository,
        verifications: MockVerificationRepository,
        provider: MockSocialIdentityProvider,
    ) -> TestUseCase {
        let users = Arc::new(users);
        let sessions = SessionService::new(
            Arc::new(sessions),
            Arc::clone(&users),
            SessionSettings::from_secs(604_800, 86_400),
        );
        SocialLoginUseCase::new(
            users,
            Arc::new(accounts),
            Arc::new(verifications),
            Arc::new(provider),
            Arc::new(sessions),
            "http://localhost:3000/".to_string(),
        )
    }

    fn stored_state(provider: SocialProvider, callback_url: &str) -> VerificationEntity {
        let now = Utc::now();
        VerificationEntity {
            id: Uuid::new_v4(),
            identifier: state_identifier("state-1"),
            value: serde_json::to_string(&OAuthState {
                provider,
                callback_url: callback_url.to_string(),
            })
            .unwrap(),
            expires_at: now + Duration::minutes(5),
            created_at: now,
            updated_at: now,
        }
    }

    fn profile(email_verified: bool) -> SocialProfile {
        SocialProfile {
            provider: SocialProvider::Github,
            account_id: "gh-42".to_string(),
            email: Some("Jane@Example.com".to_string()),
            email_verified,
            name: Some("Jane".to_string()),
            image: None,
            access_token: "gho_token".to_string(),
            scope: Some("read:user".to_string()),
        }
    }

    #[test]
    fn callback_urls_must_be_relative() {
        assert_eq!(sanitize_callback_url(Some("/dashboard".to_string())), "/dashboard");
        assert_eq!(sanitize_callback_url(Some("https://evil.test".to_string())), "/");
        assert_eq!(sanitize_callback_url(Some("//evil.test".to_string())), "/");
        assert_eq!(sanitize_callback_url(Some("/\\evil.test".to_string())), "/");
        assert_eq!(sanitize_callback_url(Some("/\t/evil.test".to_string())), "/");
        assert_eq!(
            sanitize_callback_url(Some("/settings?tab=billing".to_string())),
            "/settings?tab=billing"
        );
        assert_eq!(sanitize_callback_url(None), "/");
    }

    #[tokio::test]
    async fn start_rejects_unconfigured_provider() {
        let mut provider = MockSocialIdentityProvider::new();
        provider.expect_is_configured().return_const(false);

        let err = usecase(
            MockUserRepository::new(),
            MockAccountRepository::new(),
            MockSessionRepository::new(),
            MockVerificationRepository::new(),
            provider,
        )
        .start(SignInSocialModel {
            provider: "google".to_string(),
            callback_url: None,
        })
        .await
        .unwrap_err();

        assert!(matches!(err, SocialLoginError::ProviderNotConfigured));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn start_stores_state_and_uses_callback_redirect_uri() {
        let mut provider = MockSocialIdentityProvider::new();
        provider.expect_is_configured().return_const(true);
        provider
            .expect_authorization_url()
            .withf(|provider, state, redirect_uri| {
                *provider == SocialProvider::Github
                    && !state.is_empty()
                    && redirect_uri == "http://localhost:3000/api/auth/callback/github"
            })
            .returning(|_, state, _| Ok(format!("https://github.com/login/oauth/authorize?state={state}")));

        let mut verifications = MockVerificationRepository::new();
        verifications
            .expect_upsert()
            .withf(|verification| {
                verification.identifier.starts_with("oauth-state-")
                    && verification.value.contains("\"callbackURL\":\"/dashboard\"")
            })
            .times(1)
            .returning(|_| Ok(()));

        let url = usecase(
            MockUserRepository::new(),
            MockAccountRepository::new(),
            MockSessionRepository::new(),
            verifications,
            provider,
        )
        .start(SignInSocialModel {
            provider: "github".to_string(),
            callback_url: Some("/dashboard".to_string()),
        })
        .await
        .unwrap();

        assert!(url.starts_with("https://github.com/login/oauth/authorize?state="));
    }

    #[tokio::test]
    async fn callback_with_unknown_state_fails_before_code_exchange() {
        let mut verifications = MockVerificationRepository::new();
        verifications.expect_find().returning(|_| Ok(None));
        let mut provider = MockSocialIdentityProvider::new();
        provider.expect_fetch_profile().never();

        let err = usecase(
            MockUserRepository::new(),
            MockAccountRepository::new(),
            MockSessionRepository::new(),
            verifications,
            provider,
        )
        .callback("github", "code", "state-1", ClientInfo::default())
        .await
        .unwrap_err();

        assert_eq!(err.error_code(), "state_mismatch");
    }

    #[tokio::test]
    async fn callback_links_verified_email_to_existing_user() {
        let existing = user("jane@example.com");
        let user_id = existing.id;

        let mut verifications = MockVerificationRepository::new();
        verifications
            .expect_find()
            .returning(|_| Ok(Some(stored_state(SocialProvider::Github, "/dashboard"))));
        verifications.expect_delete().times(1).returning(|_| Ok(()));

        let mut provider = MockSocialIdentityProvider::new();
        provider
            .expect_fetch_profile()
            .returning(|_, _, _| Ok(profile(true)));

        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_find_by_provider_account()
            .returning(|_, _| Ok(None));
        accounts
            .expect_create()
            .withf(move |account| {
                account.user_id == user_id
                    && account.provider_id == "github"
                    && account.account_id == "gh-42"
                    && account.password_hash.is_none()
            })
            .times(1)
            .returning(|account| Ok(account.id));

        let mut users = MockUserRepository::new();
        let found = existing.clone();
        users
            .expect_find_by_email()
            .withf(|email| email == "jane@example.com")
            .returning(move |_| Ok(Some(found.clone())));
        users
            .expect_set_email_verified()
            .times(1)
            .returning(|_, _| Ok(()));
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));

        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_create()
            .returning(|insert| Ok(session_for(insert.user_id)));

        let (signed_in, redirect) = usecase(users, accounts, sessions, verifications, provider)
            .callback("github", "code", "state-1", ClientInfo::default())
            .await
            .unwrap();

        assert_eq!(signed_in.user.id, user_id);
        assert_eq!(redirect, "/dashboard");
    }

    #[tokio::test]
    async fn callback_refuses_to_link_unverified_email() {
        let existing = user("jane@example.com");

        let mut verifications = MockVerificationRepository::new();
        verifications
            .expect_find()
            .returning(|_| Ok(Some(stored_state(SocialProvider::Github, "/"))));
        verifications.expect_delete().returning(|_| Ok(()));

        let mut provider = MockSocialIdentityProvider::new();
        provider
            .expect_fetch_profile()
            .returning(|_, _, _| Ok(profile(false)));

        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_find_by_provider_account()
            .returning(|_, _| Ok(None));
        accounts.expect_create().never();

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(existing.clone())));

        let err = usecase(
            users,
            accounts,
            MockSessionRepository::new(),
            verifications,
            provider,
        )
        .callback("github", "code", "state-1", ClientInfo::default())
        .await
        .unwrap_err();

        assert!(matches!(err, SocialLoginError::AccountNotLinked));
    }

    #[tokio::test]
    async fn callback_signs_in_known_provider_account() {
        let existing = user("jane@example.com");
        let user_id = existing.id;

        let mut verifications = MockVerificationRepository::new();
        verifications
            .expect_find()
            .returning(|_| Ok(Some(stored_state(SocialProvider::Github, "/"))));
        verifications.expect_delete().returning(|_| Ok(()));

        let mut provider = MockSocialIdentityProvider::new();
        provider
            .expect_fetch_profile()
            .returning(|_, _, _| Ok(profile(false)));

        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_find_by_provider_account()
            .returning(move |_, _| {
                let now = Utc::now();
                Ok(Some(AccountEntity {
                    id: Uuid::new_v4(),
                    user_id,
                    provider_id: "github".to_string(),
                    account_id: "gh-42".to_string(),
                    password_hash: None,
                    access_token: None,
                    scope: None,
                    created_at: now,
                    updated_at: now,
                }))
            });
        accounts.expect_create().never();

        let mut users = MockUserRepository::new();
        users.expect_find_by_email().never();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));

        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_create()
            .returning(|insert| Ok(session_for(insert.user_id)));

        let (signed_in, redirect) = usecase(users, accounts, sessions, verifications, provider)
            .callback("github", "code", "state-1", ClientInfo::default())
            .await
            .unwrap();

        assert_eq!(signed_in.user.id, user_id);
        assert_eq!(redirect, "/");
    }
}
