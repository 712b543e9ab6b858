use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::domain::{repositories::email::EmailSender, value_objects::emails::OutgoingEmail};

const RESEND_API_BASE: &str = "https://api.resend.com";

#[derive(Debug, Clone)]
pub struct ResendConfig {
    pub api_key: String,
    pub from_email: String,
}

pub struct ResendMailer {
    http: Client,
    config: ResendConfig,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

impl ResendMailer {
    pub fn new(config: ResendConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent("saas-backend/1.0")
            .build()
            .context("failed to build resend http client")?;

        Ok(Self { http, config })
    }

    async fn ensure_success(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!(%status, body = %body, action, "resend: request failed");
        anyhow::bail!("resend {action} failed with status {status}");
    }
}

#[async_trait]
impl EmailSender for ResendMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<String> {
        let request = SendEmailRequest {
            from: &self.config.from_email,
            to: vec![email.to.as_str()],
            subject: &email.subject,
            html: &email.html,
            text: email.text.as_deref(),
        };

        let response = self
            .http
            .post(format!("{RESEND_API_BASE}/emails"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .context("failed to reach resend")?;

        let response = Self::ensure_success(response, "send email").await?;
        let payload: SendEmailResponse = response
            .json()
            .await
            .context("failed to decode resend response")?;

        info!(message_id = %payload.id, subject = %email.subject, "resend: email sent");

        Ok(payload.id)
    }

    async fn test_connection(&self) -> Result<()> {
        let response = self
            .http
            .get(format!("{RESEND_API_BASE}/domains"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .context("failed to reach resend")?;

        Self::ensure_success(response, "list domains").await?;
        Ok(())
    }
}
