use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::social_providers::{SocialProfile, SocialProvider};

#[automock]
#[async_trait]
pub trait SocialIdentityProvider {
    fn is_configured(&self, provider: SocialProvider) -> bool;
    fn authorization_url(
        &self,
        provider: SocialProvider,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String>;
    async fn fetch_profile(
        &self,
        provider: SocialProvider,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SocialProfile>;
}
