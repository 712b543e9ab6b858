use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SESSION_TOKEN_LENGTH: usize = 32;
pub const TWO_FACTOR_CHALLENGE_TTL_SECS: i64 = 10 * 60;
const TWO_FACTOR_PURPOSE: &str = "two_factor";

pub fn generate_session_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Random url-safe value for OAuth `state`.
pub fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TwoFactorClaims {
    pub sub: String,
    pub purpose: String,
    pub iat: usize,
    pub exp: usize,
}

/// Signed proof that the password step passed, carried in the `two_factor` cookie.
pub fn issue_two_factor_challenge(user_id: Uuid, secret: &str, now: DateTime<Utc>) -> Result<String> {
    let claims = TwoFactorClaims {
        sub: user_id.to_string(),
        purpose: TWO_FACTOR_PURPOSE.to_string(),
        iat: now.timestamp().max(0) as usize,
        exp: (now + Duration::seconds(TWO_FACTOR_CHALLENGE_TTL_SECS))
            .timestamp()
            .max(0) as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| anyhow!("failed to sign two factor challenge: {err}"))
}

pub fn validate_two_factor_challenge(token: &str, secret: &str) -> Result<Uuid> {
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<TwoFactorClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|err| anyhow!("two factor challenge rejected: {err}"))?;

    if token_data.claims.purpose != TWO_FACTOR_PURPOSE {
        return Err(anyhow!("token is not a two factor challenge"));
    }

    Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| anyhow!("invalid user id in two factor challenge"))
}
