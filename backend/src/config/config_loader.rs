use anyhow::{Context, Result};

use super::{
    config_model::{
        Auth, BackendServer, Database, DotEnvyConfig, Email, OAuthApp, Social, Stripe, Uploads,
    },
    stage::Stage,
};

const DEFAULT_SESSION_EXPIRES_IN_SECS: i64 = 60 * 60 * 24 * 7;
const DEFAULT_SESSION_UPDATE_AGE_SECS: i64 = 60 * 60 * 24;
const DEFAULT_UPLOADS_DIR: &str = "public/uploads";

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
    };

    let auth = Auth {
        secret: required("AUTH_SECRET")?,
        base_url: required("AUTH_BASE_URL")?.trim_end_matches('/').to_string(),
        session_expires_in_secs: optional_parsed(
            "SESSION_EXPIRES_IN_SECS",
            DEFAULT_SESSION_EXPIRES_IN_SECS,
        )?,
        session_update_age_secs: optional_parsed(
            "SESSION_UPDATE_AGE_SECS",
            DEFAULT_SESSION_UPDATE_AGE_SECS,
        )?,
        trusted_origins: optional("TRUSTED_ORIGINS")
            .map(|raw| parse_list(&raw))
            .unwrap_or_default(),
    };

    let social = Social {
        google: oauth_app("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
        github: oauth_app("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        app_url: required("APP_URL")?.trim_end_matches('/').to_string(),
    };

    let email = Email {
        resend_api_key: required("RESEND_API_KEY")?,
        from_email: required("RESEND_FROM_EMAIL")?,
    };

    let uploads = Uploads {
        dir: optional("UPLOADS_DIR").unwrap_or_else(|| DEFAULT_UPLOADS_DIR.to_string()),
    };

    Ok(DotEnvyConfig {
        stage: get_stage(),
        backend_server,
        database,
        auth,
        social,
        stripe,
        email,
        uploads,
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or("".to_string());
    Stage::try_from(&stage_str).unwrap_or_default()
}

fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} is missing"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn optional_parsed(key: &str, default: i64) -> Result<i64> {
    match optional(key) {
        Some(raw) => raw.parse().with_context(|| format!("{key} is invalid")),
        None => Ok(default),
    }
}

fn oauth_app(id_key: &str, secret_key: &str) -> Option<OAuthApp> {
    Some(OAuthApp {
        client_id: optional(id_key)?,
        client_secret: optional(secret_key)?,
    })
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().trim_end_matches('/').to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
