use std::collections::HashMap;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::payments::stripe_client::{
    CheckoutSessionRequest, StripeCheckoutSession, StripeClient, StripeEvent, StripePrice,
    StripeProduct, StripeSubscription,
};
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn find_customer_by_email(&self, email: &str) -> AnyResult<Option<String>>;

    async fn create_customer(
        &self,
        email: &str,
        name: Option<String>,
        user_id: Uuid,
    ) -> AnyResult<String>;

    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> AnyResult<()>;

    async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> AnyResult<()>;

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> AnyResult<StripeCheckoutSession>;

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        metadata: HashMap<String, String>,
    ) -> AnyResult<StripeSubscription>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription>;

    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &str,
        plan_name: &str,
    ) -> AnyResult<StripeSubscription>;

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> AnyResult<StripeSubscription>;

    async fn retrieve_price(&self, price_id: &str) -> AnyResult<StripePrice>;

    async fn list_active_products(&self) -> AnyResult<Vec<StripeProduct>>;

    async fn list_prices(&self, product_id: &str) -> AnyResult<Vec<StripePrice>>;

    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> AnyResult<String>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn find_customer_by_email(&self, email: &str) -> AnyResult<Option<String>> {
        self.find_customer_by_email(email).await
    }

    async fn create_customer(
        &self,
        email: &str,
        name: Option<String>,
        user_id: Uuid,
    ) -> AnyResult<String> {
        self.create_customer(email, name.as_deref(), user_id).await
    }

    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> AnyResult<()> {
        self.attach_payment_method(payment_method_id, customer_id)
            .await
    }

    async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> AnyResult<()> {
        self.set_default_payment_method(customer_id, payment_method_id)
            .await
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> AnyResult<StripeCheckoutSession> {
        self.create_checkout_session(&request).await
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        metadata: HashMap<String, String>,
    ) -> AnyResult<StripeSubscription> {
        self.create_subscription(customer_id, price_id, &metadata)
            .await
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription> {
        self.retrieve_subscription(subscription_id).await
    }

    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &str,
        plan_name: &str,
    ) -> AnyResult<StripeSubscription> {
        self.update_subscription_price(subscription_id, item_id, price_id, plan_name)
            .await
    }

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> AnyResult<StripeSubscription> {
        self.set_cancel_at_period_end(subscription_id, cancel_at_period_end)
            .await
    }

    async fn retrieve_price(&self, price_id: &str) -> AnyResult<StripePrice> {
        self.retrieve_price(price_id).await
    }

    async fn list_active_products(&self) -> AnyResult<Vec<StripeProduct>> {
        self.list_active_products().await
    }

    async fn list_prices(&self, product_id: &str) -> AnyResult<Vec<StripePrice>> {
        self.list_prices(product_id).await
    }

    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> AnyResult<String> {
        self.create_billing_portal_session(customer_id, return_url)
            .await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}
