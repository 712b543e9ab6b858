use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::auth::CurrentSession;

const AUTH_PAGES: [&str; 3] = ["/login", "/signup", "/forgot-password"];
const PROTECTED_PAGES: [&str; 3] = ["/dashboard", "/profile", "/settings"];

fn matches_page(path: &str, page: &str) -> bool {
    path.strip_prefix(page)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Where a page request should be sent instead, if anywhere.
pub fn guard_redirect(path: &str, signed_in: bool) -> Option<String> {
    if signed_in && AUTH_PAGES.iter().any(|page| matches_page(path, page)) {
        return Some("/".to_string());
    }

    if !signed_in && PROTECTED_PAGES.iter().any(|page| matches_page(path, page)) {
        let redirect: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
        return Some(format!("/login?redirect={redirect}"));
    }

    None
}

/// Runs after the session middleware so `CurrentSession` is already resolved.
pub async fn route_guard(request: Request, next: Next) -> Response {
    let signed_in = request.extensions().get::<CurrentSession>().is_some();

    if let Some(target) = guard_redirect(request.uri().path(), signed_in) {
        debug!(path = %request.uri().path(), %target, "route guard: redirecting");
        return Redirect::temporary(&target).into_response();
    }

    next.run(request).await
}
