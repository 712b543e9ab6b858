use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use crates::{
    domain::repositories::{
        accounts::AccountRepository, sessions::SessionRepository,
        social_identity::SocialIdentityProvider, users::UserRepository,
        verifications::VerificationRepository,
    },
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                accounts::AccountPostgres, users::UserPostgres, verifications::VerificationPostgres,
            },
        },
        oauth::social_client::SocialOAuthClient,
    },
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::{
    axum_http::{client_info::client_info, cookies::CookieSettings, error_responses::ApiError},
    config::config_model::DotEnvyConfig,
    usecases::social_login::{SignInSocialModel, SocialLoginUseCase},
};

use super::PgSessionService;

const LOGIN_PAGE: &str = "/login";

pub struct SocialLoginState<U, A, S, V, P>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
    P: SocialIdentityProvider + Send + Sync + 'static,
{
    pub usecase: SocialLoginUseCase<U, A, S, V, P>,
    pub cookies: CookieSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user declined consent.
    pub error: Option<String>,
}

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    sessions: Arc<PgSessionService>,
    identity_provider: Arc<SocialOAuthClient>,
    config: Arc<DotEnvyConfig>,
) -> Router {
    let social_login_usecase = SocialLoginUseCase::new(
        Arc::new(UserPostgres::new(Arc::clone(&db_pool))),
        Arc::new(AccountPostgres::new(Arc::clone(&db_pool))),
        Arc::new(VerificationPostgres::new(Arc::clone(&db_pool))),
        identity_provider,
        sessions,
        config.auth.base_url.clone(),
    );

    router(Arc::new(SocialLoginState {
        usecase: social_login_usecase,
        cookies: CookieSettings::from(config.as_ref()),
    }))
}

pub fn router<U, A, S, V, P>(state: Arc<SocialLoginState<U, A, S, V, P>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
    P: SocialIdentityProvider + Send + Sync + 'static,
{
    Router::new()
        .route("/sign-in/social", post(sign_in_social))
        .route("/callback/:provider", get(callback))
        .with_state(state)
}

fn login_error_redirect(code: &str) -> Redirect {
    let code: String = url::form_urlencoded::byte_serialize(code.as_bytes()).collect();
    Redirect::to(&format!("{LOGIN_PAGE}?error={code}"))
}

pub async fn sign_in_social<U, A, S, V, P>(
    State(state): State<Arc<SocialLoginState<U, A, S, V, P>>>,
    Json(model): Json<SignInSocialModel>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
    P: SocialIdentityProvider + Send + Sync + 'static,
{
    let url = state.usecase.start(model).await?;
    Ok(Json(json!({ "url": url, "redirect": true })))
}

pub async fn callback<U, A, S, V, P>(
    State(state): State<Arc<SocialLoginState<U, A, S, V, P>>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
    P: SocialIdentityProvider + Send + Sync + 'static,
{
    if let Some(error) = query.error {
        warn!(%provider, %error, "social login router: provider returned an error");
        return login_error_redirect(&error).into_response();
    }

    let code = query.code.unwrap_or_default();
    let oauth_state = query.state.unwrap_or_default();

    match state
        .usecase
        .callback(&provider, &code, &oauth_state, client_info(&headers))
        .await
    {
        Ok((signed_in, callback_url)) => {
            let jar = state.cookies.with_session(jar, &signed_in.session.token);
            (jar, Redirect::to(&callback_url)).into_response()
        }
        Err(err) => {
            warn!(%provider, error = %err, "social login router: callback failed");
            login_error_redirect(err.error_code()).into_response()
        }
    }
}
