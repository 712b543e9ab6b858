use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration;

use crate::{auth::tokens::TWO_FACTOR_CHALLENGE_TTL_SECS, config::config_model::DotEnvyConfig};

pub const SESSION_COOKIE: &str = "session_token";
pub const TWO_FACTOR_COOKIE: &str = "two_factor";

/// Attributes shared by every cookie the API sets.
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    pub secure: bool,
    pub session_max_age_secs: i64,
}

impl From<&DotEnvyConfig> for CookieSettings {
    fn from(config: &DotEnvyConfig) -> Self {
        Self {
            secure: config.stage.secure_cookies(),
            session_max_age_secs: config.auth.session_expires_in_secs,
        }
    }
}

impl CookieSettings {
    fn build(&self, name: &'static str, value: String, max_age_secs: i64) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(Duration::seconds(max_age_secs))
            .build()
    }

    pub fn with_session(&self, jar: CookieJar, token: &str) -> CookieJar {
        jar.add(self.build(SESSION_COOKIE, token.to_string(), self.session_max_age_secs))
    }

    pub fn with_two_factor_challenge(&self, jar: CookieJar, challenge: &str) -> CookieJar {
        jar.add(self.build(
            TWO_FACTOR_COOKIE,
            challenge.to_string(),
            TWO_FACTOR_CHALLENGE_TTL_SECS,
        ))
    }

    /// Overwrites the cookie with an already expired one.
    pub fn cleared(&self, jar: CookieJar, name: &'static str) -> CookieJar {
        jar.add(self.build(name, String::new(), 0))
    }
}
