use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use crates::domain::repositories::{sessions::SessionRepository, users::UserRepository};
use tracing::{debug, error};

use crate::{axum_http::cookies::SESSION_COOKIE, usecases::sessions::SessionService};

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Resolves the caller's session from the `session_token` cookie or a bearer
/// token and stores it in the request extensions. Requests without a valid
/// session continue anonymously.
pub async fn resolve_session<S, U>(
    State(sessions): State<Arc<SessionService<S, U>>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response
where
    S: SessionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| bearer_token(request.headers()));

    if let Some(token) = token {
        match sessions.resolve(&token).await {
            Ok(Some(current)) => {
                debug!(user_id = %current.user.id, "session middleware: request authenticated");
                request.extensions_mut().insert(current);
            }
            Ok(None) => {}
            Err(err) => {
                error!(db_error = ?err, "session middleware: failed to resolve session");
            }
        }
    }

    next.run(request).await
}
