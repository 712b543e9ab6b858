use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
};
use axum_extra::extract::cookie::CookieJar;
use crates::{
    domain::{
        repositories::{
            accounts::AccountRepository, sessions::SessionRepository,
            two_factors::TwoFactorRepository, users::UserRepository,
        },
        value_objects::users::UserDto,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            accounts::AccountPostgres, two_factors::TwoFactorPostgres, users::UserPostgres,
        },
    },
};
use serde_json::json;

use crate::{
    auth::{AuthUser, CurrentSession},
    axum_http::{
        client_info::client_info,
        cookies::{CookieSettings, TWO_FACTOR_COOKIE},
        error_responses::ApiError,
    },
    config::config_model::DotEnvyConfig,
    usecases::{
        auth::SignedIn,
        two_factor::{CodeModel, PasswordModel, TwoFactorUseCase},
    },
};

use super::{PgSessionService, auth::signed_in_body};

pub struct TwoFactorState<U, A, S, T>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    T: TwoFactorRepository + Send + Sync + 'static,
{
    pub usecase: TwoFactorUseCase<U, A, S, T>,
    pub cookies: CookieSettings,
}

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    sessions: Arc<PgSessionService>,
    config: Arc<DotEnvyConfig>,
) -> Router {
    let two_factor_usecase = TwoFactorUseCase::new(
        Arc::new(UserPostgres::new(Arc::clone(&db_pool))),
        Arc::new(AccountPostgres::new(Arc::clone(&db_pool))),
        Arc::new(TwoFactorPostgres::new(Arc::clone(&db_pool))),
        sessions,
        config.auth.secret.clone(),
    );

    router(Arc::new(TwoFactorState {
        usecase: two_factor_usecase,
        cookies: CookieSettings::from(config.as_ref()),
    }))
}

pub fn router<U, A, S, T>(state: Arc<TwoFactorState<U, A, S, T>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    T: TwoFactorRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/two-factor/enable", post(enable))
        .route("/two-factor/verify-totp", post(verify_totp))
        .route("/two-factor/verify-backup-code", post(verify_backup_code))
        .route("/two-factor/generate-backup-codes", post(generate_backup_codes))
        .route("/two-factor/disable", post(disable))
        .with_state(state)
}

fn challenge_cookie(jar: &CookieJar) -> Option<String> {
    jar.get(TWO_FACTOR_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Swaps the challenge cookie for a session cookie.
fn complete_sign_in(cookies: &CookieSettings, jar: CookieJar, signed_in: SignedIn) -> Response {
    let jar = cookies.with_session(jar, &signed_in.session.token);
    let jar = cookies.cleared(jar, TWO_FACTOR_COOKIE);
    (jar, Json(signed_in_body(signed_in))).into_response()
}

pub async fn enable<U, A, S, T>(
    State(state): State<Arc<TwoFactorState<U, A, S, T>>>,
    auth: AuthUser,
    Json(model): Json<PasswordModel>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    T: TwoFactorRepository + Send + Sync + 'static,
{
    let enabled = state
        .usecase
        .enable(auth.user_id, &auth.email, &model.password)
        .await?;
    Ok(Json(enabled))
}

/// With a session this confirms setup; otherwise it is the second sign-in step.
pub async fn verify_totp<U, A, S, T>(
    State(state): State<Arc<TwoFactorState<U, A, S, T>>>,
    current: Option<CurrentSession>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(model): Json<CodeModel>,
) -> Result<Response, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    T: TwoFactorRepository + Send + Sync + 'static,
{
    if let Some(CurrentSession { mut user, session }) = current {
        state.usecase.confirm_totp(&user, &model.code).await?;
        user.two_factor_enabled = true;
        return Ok(Json(json!({
            "token": session.token,
            "user": UserDto::from(user),
        }))
        .into_response());
    }

    let challenge = challenge_cookie(&jar);
    let signed_in = state
        .usecase
        .sign_in_with_totp(challenge.as_deref(), &model.code, client_info(&headers))
        .await?;
    Ok(complete_sign_in(&state.cookies, jar, signed_in))
}

pub async fn verify_backup_code<U, A, S, T>(
    State(state): State<Arc<TwoFactorState<U, A, S, T>>>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(model): Json<CodeModel>,
) -> Result<Response, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    T: TwoFactorRepository + Send + Sync + 'static,
{
    let challenge = challenge_cookie(&jar);
    let signed_in = state
        .usecase
        .sign_in_with_backup_code(challenge.as_deref(), &model.code, client_info(&headers))
        .await?;
    Ok(complete_sign_in(&state.cookies, jar, signed_in))
}

pub async fn generate_backup_codes<U, A, S, T>(
    State(state): State<Arc<TwoFactorState<U, A, S, T>>>,
    auth: AuthUser,
    Json(model): Json<PasswordModel>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    T: TwoFactorRepository + Send + Sync + 'static,
{
    let backup_codes = state
        .usecase
        .generate_backup_codes(auth.user_id, &model.password)
        .await?;
    Ok(Json(json!({ "status": true, "backupCodes": backup_codes })))
}

pub async fn disable<U, A, S, T>(
    State(state): State<Arc<TwoFactorState<U, A, S, T>>>,
    auth: AuthUser,
    Json(model): Json<PasswordModel>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    A: AccountRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
    T: TwoFactorRepository + Send + Sync + 'static,
{
    state.usecase.disable(auth.user_id, &model.password).await?;
    Ok(Json(json!({ "status": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{tokens::issue_two_factor_challenge, totp},
        axum_http::routers::test_support::{
            body_json, current_session, json_request, set_cookies, signed_in,
        },
        usecases::sessions::{
            SessionService, SessionSettings,
            test_support::{session_for, user},
        },
    };
    use axum::http::StatusCode;
    use chrono::Utc;
    use crates::domain::{
        entities::two_factors::TwoFactorEntity,
        repositories::{
            accounts::MockAccountRepository, sessions::MockSessionRepository,
            two_factors::MockTwoFactorRepository, users::MockUserRepository,
        },
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "router-secret";

    fn app(
        users: MockUserRepository,
        sessions: MockSessionRepository,
        two_factors: MockTwoFactorRepository,
    ) -> Router {
        let users = Arc::new(users);
        let sessions = SessionService::new(
            Arc::new(sessions),
            Arc::clone(&users),
            SessionSettings::from_secs(604_800, 86_400),
        );
        router(Arc::new(TwoFactorState {
            usecase: TwoFactorUseCase::new(
                users,
                Arc::new(MockAccountRepository::new()),
                Arc::new(two_factors),
                Arc::new(sessions),
                SECRET.to_string(),
            ),
            cookies: CookieSettings {
                secure: false,
                session_max_age_secs: 604_800,
            },
        }))
    }

    fn stored(user_id: Uuid, secret: &str) -> TwoFactorEntity {
        let now = Utc::now();
        TwoFactorEntity {
            id: Uuid::new_v4(),
            user_id,
            secret: secret.to_string(),
            backup_codes: vec!["aaaaa-bbbbb".to_string()],
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn verify_totp_without_session_or_cookie_is_rejected() {
        let response = app(
            MockUserRepository::new(),
            MockSessionRepository::new(),
            MockTwoFactorRepository::new(),
        )
        .oneshot(json_request(
            "POST",
            "/two-factor/verify-totp",
            json!({ "code": "123456" }),
        ))
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Invalid two factor cookie" })
        );
    }

    #[tokio::test]
    async fn verify_totp_with_challenge_cookie_opens_session() {
        let owner = user("jane@example.com");
        let user_id = owner.id;
        let secret = totp::generate_secret();
        let code = totp::code_at(&secret, Utc::now().timestamp() as u64).unwrap();
        let challenge = issue_two_factor_challenge(user_id, SECRET, Utc::now()).unwrap();

        let mut two_factors = MockTwoFactorRepository::new();
        two_factors
            .expect_find_by_user()
            .returning(move |_| Ok(Some(stored(user_id, &secret))));
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(owner.clone())));
        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_create()
            .returning(|insert| Ok(session_for(insert.user_id)));

        let mut request = json_request("POST", "/two-factor/verify-totp", json!({ "code": code }));
        request.headers_mut().insert(
            "cookie",
            format!("two_factor={challenge}").parse().unwrap(),
        );

        let response = app(users, sessions, two_factors)
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|cookie| cookie.starts_with("session_token=session-token")));
        assert!(cookies.iter().any(|cookie| cookie.starts_with("two_factor=;")));
        assert_eq!(body_json(response).await["token"], "session-token");
    }

    #[tokio::test]
    async fn verify_totp_with_session_confirms_setup() {
        let current = current_session("jane@example.com");
        let user_id = current.user.id;
        let secret = totp::generate_secret();
        let code = totp::code_at(&secret, Utc::now().timestamp() as u64).unwrap();

        let mut two_factors = MockTwoFactorRepository::new();
        two_factors
            .expect_find_by_user()
            .returning(move |_| Ok(Some(stored(user_id, &secret))));
        let mut users = MockUserRepository::new();
        users
            .expect_set_two_factor_enabled()
            .withf(move |id, enabled| *id == user_id && *enabled)
            .times(1)
            .returning(|_, _| Ok(()));
        let mut sessions = MockSessionRepository::new();
        sessions.expect_create().never();

        let response = app(users, sessions, two_factors)
            .oneshot(signed_in(
                json_request("POST", "/two-factor/verify-totp", json!({ "code": code })),
                &current,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["user"]["twoFactorEnabled"], true);
    }

    #[tokio::test]
    async fn disable_requires_session() {
        let response = app(
            MockUserRepository::new(),
            MockSessionRepository::new(),
            MockTwoFactorRepository::new(),
        )
        .oneshot(json_request(
            "POST",
            "/two-factor/disable",
            json!({ "password": "Secret123!" }),
        ))
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
