pub mod passwords;
pub mod tokens;
pub mod totp;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use crates::domain::entities::{sessions::SessionEntity, users::UserEntity};
use uuid::Uuid;

use crate::axum_http::error_responses::ApiError;

/// The resolved session of the caller; inserted into request extensions by
/// the session middleware.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub user: UserEntity,
    pub session: SessionEntity,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub session_token: String,
}

impl From<&CurrentSession> for AuthUser {
    fn from(current: &CurrentSession) -> Self {
        Self {
            user_id: current.user.id,
            email: current.user.email.clone(),
            name: current.user.name.clone(),
            session_token: current.session.token.clone(),
        }
    }
}

/// `Some` when the request carries a valid session.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .map(AuthUser::from)
            .ok_or(ApiError::Unauthorized)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(
            parts.extensions.get::<CurrentSession>().map(AuthUser::from),
        ))
    }
}

#[cfg(test)]
mod tests;
