use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, warn};
use url::Url;

use crate::domain::{
    repositories::social_identity::SocialIdentityProvider,
    value_objects::social_providers::{SocialProfile, SocialProvider},
};

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_URL: &str = "https://api.github.com/user";
const GITHUB_EMAILS_URL: &str = "https://api.github.com/user/emails";

const GOOGLE_SCOPES: &str = "openid email profile";
const GITHUB_SCOPES: &str = "read:user user:email";

#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Default)]
pub struct SocialOAuthConfig {
    pub google: Option<OAuthCredentials>,
    pub github: Option<OAuthCredentials>,
}

pub struct SocialOAuthClient {
    http: Client,
    config: SocialOAuthConfig,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

impl SocialOAuthClient {
    pub fn new(config: SocialOAuthConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent("saas-backend/1.0")
            .build()
            .context("failed to build oauth http client")?;

        Ok(Self { http, config })
    }

    fn credentials(&self, provider: SocialProvider) -> Result<&OAuthCredentials> {
        let credentials = match provider {
            SocialProvider::Google => self.config.google.as_ref(),
            SocialProvider::Github => self.config.github.as_ref(),
        };
        credentials.with_context(|| format!("{provider} sign-in is not configured"))
    }

    async fn exchange_code(
        &self,
        token_url: &str,
        credentials: &OAuthCredentials,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse> {
        let response = self
            .http
            .post(token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .send()
            .await
            .context("failed to reach token endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, token_url, "oauth: code exchange failed");
            anyhow::bail!("code exchange failed with status {status}");
        }

        response
            .json::<TokenResponse>()
            .await
            .context("token endpoint returned an unexpected payload")
    }

    async fn google_profile(&self, code: &str, redirect_uri: &str) -> Result<SocialProfile> {
        let credentials = self.credentials(SocialProvider::Google)?;
        let tokens = self
            .exchange_code(GOOGLE_TOKEN_URL, credentials, code, redirect_uri)
            .await?;

        let info = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .context("failed to reach google userinfo")?
            .error_for_status()
            .context("google userinfo rejected the token")?
            .json::<GoogleUserInfo>()
            .await
            .context("failed to decode google userinfo")?;

        Ok(SocialProfile {
            provider: SocialProvider::Google,
            account_id: info.sub,
            email: info.email,
            email_verified: info.email_verified,
            name: info.name,
            image: info.picture,
            access_token: tokens.access_token,
            scope: tokens.scope,
        })
    }

    async fn github_profile(&self, code: &str, redirect_uri: &str) -> Result<SocialProfile> {
        let credentials = self.credentials(SocialProvider::Github)?;
        let tokens = self
            .exchange_code(GITHUB_TOKEN_URL, credentials, code, redirect_uri)
            .await?;

        let user = self
            .http
            .get(GITHUB_USER_URL)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .context("failed to reach github user api")?
            .error_for_status()
            .context("github user api rejected the token")?
            .json::<GithubUser>()
            .await
            .context("failed to decode github user")?;

        // Private addresses are missing from /user; the emails endpoint also says whether they're verified.
        let emails = match self.github_emails(&tokens.access_token).await {
            Ok(emails) => emails,
            Err(err) => {
                warn!(error = ?err, "oauth: github email lookup failed");
                Vec::new()
            }
        };
        let (email, email_verified) = pick_github_email(user.email, &emails);

        Ok(SocialProfile {
            provider: SocialProvider::Github,
            account_id: user.id.to_string(),
            email,
            email_verified,
            name: user.name.or(Some(user.login)),
            image: user.avatar_url,
            access_token: tokens.access_token,
            scope: tokens.scope,
        })
    }

    async fn github_emails(&self, access_token: &str) -> Result<Vec<GithubEmail>> {
        self.http
            .get(GITHUB_EMAILS_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .context("failed to reach github emails api")?
            .error_for_status()
            .context("github emails api rejected the token")?
            .json::<Vec<GithubEmail>>()
            .await
            .context("failed to decode github emails")
    }
}

fn pick_github_email(profile_email: Option<String>, emails: &[GithubEmail]) -> (Option<String>, bool) {
    match profile_email {
        Some(email) => {
            let verified = emails
                .iter()
                .any(|entry| entry.email == email && entry.verified);
            (Some(email), verified)
        }
        None => emails
            .iter()
            .find(|entry| entry.primary)
            .or_else(|| emails.first())
            .map(|entry| (Some(entry.email.clone()), entry.verified))
            .unwrap_or((None, false)),
    }
}

#[async_trait]
impl SocialIdentityProvider for SocialOAuthClient {
    fn is_configured(&self, provider: SocialProvider) -> bool {
        self.credentials(provider).is_ok()
    }

    fn authorization_url(
        &self,
        provider: SocialProvider,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String> {
        let credentials = self.credentials(provider)?;
        let (base, scopes) = match provider {
            SocialProvider::Google => (GOOGLE_AUTHORIZE_URL, GOOGLE_SCOPES),
            SocialProvider::Github => (GITHUB_AUTHORIZE_URL, GITHUB_SCOPES),
        };

        let mut url = Url::parse(base)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &credentials.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", state)
            .append_pair("scope", scopes);

        Ok(url.to_string())
    }

    async fn fetch_profile(
        &self,
        provider: SocialProvider,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SocialProfile> {
        match provider {
            SocialProvider::Google => self.google_profile(code, redirect_uri).await,
            SocialProvider::Github => self.github_profile(code, redirect_uri).await,
        }
    }
}
