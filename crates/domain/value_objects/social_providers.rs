use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SocialProvider {
    Google,
    Github,
}

impl SocialProvider {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "google" => Some(Self::Google),
            "github" => Some(Self::Github),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SocialProvider::Google => "google",
            SocialProvider::Github => "github",
        }
    }
}

impl Display for SocialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity returned by a provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct SocialProfile {
    pub provider: SocialProvider,
    pub account_id: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
    pub image: Option<String>,
    pub access_token: String,
    pub scope: Option<String>,
}

impl SocialProfile {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "User".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names_case_insensitively() {
        assert_eq!(SocialProvider::parse(" GitHub "), Some(SocialProvider::Github));
        assert_eq!(SocialProvider::parse("google"), Some(SocialProvider::Google));
        assert_eq!(SocialProvider::parse("twitter"), None);
    }

    #[test]
    fn display_name_falls_back_to_email_local_part() {
        let profile = SocialProfile {
            provider: SocialProvider::Github,
            account_id: "42".to_string(),
            email: Some("octo@example.com".to_string()),
            email_verified: true,
            name: None,
            image: None,
            access_token: "token".to_string(),
            scope: None,
        };
        assert_eq!(profile.display_name(), "octo");
    }
}
