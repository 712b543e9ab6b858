use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub stage: Stage,
    pub backend_server: BackendServer,
    pub database: Database,
    pub auth: Auth,
    pub social: Social,
    pub stripe: Stripe,
    pub email: Email,
    pub uploads: Uploads,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Auth {
    pub secret: String,
    pub base_url: String,
    pub session_expires_in_secs: i64,
    pub session_update_age_secs: i64,
    pub trusted_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Default)]
pub struct Social {
    pub google: Option<OAuthApp>,
    pub github: Option<OAuthApp>,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub app_url: String,
}

#[derive(Debug, Clone)]
pub struct Email {
    pub resend_api_key: String,
    pub from_email: String,
}

#[derive(Debug, Clone)]
pub struct Uploads {
    pub dir: String,
}
