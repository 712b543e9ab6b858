use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use crates::{
    domain::{
        repositories::{
            accounts::AccountRepository, sessions::SessionRepository, users::UserRepository,
        },
        value_objects::users::{SessionDto, UserDto},
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{accounts::AccountPostgres, users::UserPostgres},
    },
};
use serde_json::json;
use tracing::info;

use crate::{
    auth::{AuthUser, CurrentSession, MaybeAuthUser},
    axum_http::{
        client_info::client_info,
        cookies::{CookieSettings, SESSION_COOKIE, TWO_FACTOR_COOKIE},
        error_responses::ApiError,
    },
    config::config_model::DotEnvyConfig,
    usecases::auth::{
        AuthUseCase, ChangePasswordModel, SignInEmailModel, SignInOutcome, SignUpEmailModel,
        SignedIn, UpdateUserModel,
    },
};

use super::PgSessionService;

pub struct AuthState<U, A, S>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    pub usecase: AuthUseCase<U, A, S>,
    pub cookies: CookieSettings,
}

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    sessions: Arc<PgSessionService>,
    config: Arc<DotEnvyConfig>,
) -> Router {
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));
    let account_repository = AccountPostgres::new(Arc::clone(&db_pool));
    let auth_usecase = AuthUseCase::new(
        Arc::new(user_repository),
        Arc::new(account_repository),
        sessions,
        config.auth.secret.clone(),
    );

    router(Arc::new(AuthState {
        usecase: auth_usecase,
        cookies: CookieSettings::from(config.as_ref()),
    }))
}

pub fn router<U, A, S>(state: Arc<AuthState<U, A, S>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/sign-up/email", post(sign_up_email))
        .route("/sign-in/email", post(sign_in_email))
        .route("/sign-out", post(sign_out))
        .route("/get-session", get(get_session))
        .route("/update-user", post(update_user))
        .route("/change-password", post(change_password))
        .with_state(state)
}

/// `{token, user}` body shared by every endpoint that opens a session.
pub fn signed_in_body(signed_in: SignedIn) -> serde_json::Value {
    json!({
        "token": signed_in.session.token,
        "user": UserDto::from(signed_in.user),
    })
}

pub async fn sign_up_email<U, A, S>(
    State(state): State<Arc<AuthState<U, A, S>>>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(model): Json<SignUpEmailModel>,
) -> Result<Response, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    let signed_in = state
        .usecase
        .sign_up_email(model, client_info(&headers))
        .await?;

    let jar = state.cookies.with_session(jar, &signed_in.session.token);
    Ok((jar, Json(signed_in_body(signed_in))).into_response())
}

pub async fn sign_in_email<U, A, S>(
    State(state): State<Arc<AuthState<U, A, S>>>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(model): Json<SignInEmailModel>,
) -> Result<Response, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    match state
        .usecase
        .sign_in_email(model, client_info(&headers))
        .await?
    {
        SignInOutcome::SignedIn(signed_in) => {
            let jar = state.cookies.with_session(jar, &signed_in.session.token);
            let mut body = signed_in_body(signed_in);
            body["redirect"] = json!(false);
            Ok((jar, Json(body)).into_response())
        }
        SignInOutcome::TwoFactorRequired { challenge } => {
            let jar = state.cookies.with_two_factor_challenge(jar, &challenge);
            Ok((jar, Json(json!({ "twoFactorRedirect": true }))).into_response())
        }
    }
}

pub async fn sign_out<U, A, S>(
    State(state): State<Arc<AuthState<U, A, S>>>,
    MaybeAuthUser(user): MaybeAuthUser,
    jar: CookieJar,
) -> Result<Response, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    if let Some(user) = user {
        state.usecase.sign_out(&user.session_token).await?;
        info!(user_id = %user.user_id, "auth router: signed out");
    }

    let jar = state.cookies.cleared(jar, SESSION_COOKIE);
    let jar = state.cookies.cleared(jar, TWO_FACTOR_COOKIE);
    Ok((jar, Json(json!({ "success": true }))).into_response())
}

pub async fn get_session(current: Option<CurrentSession>) -> impl IntoResponse {
    let body = current.map(|current| {
        json!({
            "session": SessionDto::from(current.session),
            "user": UserDto::from(current.user),
        })
    });
    Json(body)
}

pub async fn update_user<U, A, S>(
    State(state): State<Arc<AuthState<U, A, S>>>,
    auth: AuthUser,
    Json(model): Json<UpdateUserModel>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    state.usecase.update_user(auth.user_id, model).await?;
    Ok(Json(json!({ "status": true })))
}

pub async fn change_password<U, A, S>(
    State(state): State<Arc<AuthState<U, A, S>>>,
    auth: AuthUser,
    Json(model): Json<ChangePasswordModel>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    state
        .usecase
        .change_password(auth.user_id, &auth.session_token, model)
        .await?;
    Ok(Json(json!({ "status": true })))
}
