use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Seconds a signed webhook delivery stays acceptable.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub api_version: Option<String>,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: Option<String>,
    pub mode: Option<String>,
    pub url: Option<String>,
    pub subscription: Option<String>,
    pub customer: Option<String>,
    pub customer_email: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

impl StripeCheckoutSession {
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.get(key))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeRecurring {
    pub interval: String,
    #[serde(default = "default_interval_count")]
    pub interval_count: i64,
}

fn default_interval_count() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
    #[serde(default)]
    pub active: bool,
    pub unit_amount: Option<i64>,
    pub currency: String,
    pub recurring: Option<StripeRecurring>,
    pub nickname: Option<String>,
    /// Product id, or the product object when expanded.
    pub product: Option<serde_json::Value>,
}

impl StripePrice {
    pub fn interval(&self) -> Option<&str> {
        self.recurring.as_ref().map(|recurring| recurring.interval.as_str())
    }

    pub fn product_id(&self) -> Option<&str> {
        match self.product.as_ref()? {
            serde_json::Value::String(id) => Some(id.as_str()),
            value => value.get("id").and_then(|id| id.as_str()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeProduct {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: Option<String>,
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub billing_cycle_anchor: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
    pub latest_invoice: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    pub id: String,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub price: Option<StripePrice>,
}

impl StripeSubscription {
    /// Returns the subscription period start timestamp, falling back to the first item
    /// or the billing cycle anchor when the top-level field is absent.
    pub fn period_start(&self) -> Option<i64> {
        self.current_period_start
            .or_else(|| {
                self.items
                    .data
                    .first()
                    .and_then(|item| item.current_period_start)
            })
            .or(self.billing_cycle_anchor)
    }

    /// Returns the subscription period end timestamp, falling back to the first item when needed.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_end)
        })
    }

    pub fn first_item(&self) -> Option<&StripeSubscriptionItem> {
        self.items.data.first()
    }

    pub fn first_price(&self) -> Option<&StripePrice> {
        self.first_item().and_then(|item| item.price.as_ref())
    }

    /// Client secret of the first invoice's payment intent, present when
    /// `latest_invoice.payment_intent` was expanded.
    pub fn payment_intent_client_secret(&self) -> Option<String> {
        self.latest_invoice
            .as_ref()?
            .get("payment_intent")?
            .get("client_secret")?
            .as_str()
            .map(str::to_string)
    }
}

/// Converts a Stripe unix timestamp.
pub fn from_unix(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(seconds, 0)
}

/// Parameters for a subscription-mode Checkout Session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckoutSessionRequest {
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
    pub subscription_metadata: HashMap<String, String>,
}

impl CheckoutSessionRequest {
    fn form_body(&self) -> Vec<(String, String)> {
        let mut body: Vec<(String, String)> = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("line_items[0][price]".to_string(), self.price_id.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        if let Some(customer) = &self.customer_id {
            body.push(("customer".to_string(), customer.clone()));
        } else if let Some(email) = &self.customer_email {
            body.push(("customer_email".to_string(), email.clone()));
        }

        let mut metadata: Vec<_> = self.metadata.iter().collect();
        metadata.sort();
        for (key, value) in metadata {
            body.push((format!("metadata[{}]", key), value.clone()));
        }

        let mut subscription_metadata: Vec<_> = self.subscription_metadata.iter().collect();
        subscription_metadata.sort();
        for (key, value) in subscription_metadata {
            body.push((format!("subscription_data[metadata][{}]", key), value.clone()));
        }

        body
    }
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
        }
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let (stripe_error_type, stripe_error_code, stripe_error_param, stripe_error_message, stripe_decline_code) =
            match serde_json::from_str::<StripeErrorEnvelope>(&body) {
                Ok(envelope) => {
                    let details = envelope.error;
                    (
                        details.type_,
                        details.code,
                        details.param,
                        details.message,
                        details.decline_code,
                    )
                }
                Err(_) => (None, None, None, None, None),
            };

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?stripe_error_type,
            stripe_error_code = ?stripe_error_code,
            stripe_error_param = ?stripe_error_param,
            stripe_error_message = ?stripe_error_message,
            stripe_decline_code = ?stripe_decline_code,
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &[(String, String)],
        context: &str,
    ) -> Result<T> {
        let resp = self
            .http
            .post(format!("{STRIPE_API_BASE}{path}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body)
            .send()
            .await
            .with_context(|| format!("failed to reach stripe: {context}"))?;
        let resp = Self::ensure_success(resp, context).await?;

        resp.json::<T>()
            .await
            .with_context(|| format!("unexpected stripe response: {context}"))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<T> {
        let resp = self
            .http
            .get(format!("{STRIPE_API_BASE}{path}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .query(query)
            .send()
            .await
            .with_context(|| format!("failed to reach stripe: {context}"))?;
        let resp = Self::ensure_success(resp, context).await?;

        resp.json::<T>()
            .await
            .with_context(|| format!("unexpected stripe response: {context}"))
    }

    /// First customer registered with the email, if any.
    pub async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>> {
        // https://stripe.com/docs/api/customers/list
        #[derive(Deserialize)]
        struct CustomerResp {
            id: String,
        }

        let customers: StripeList<CustomerResp> = self
            .get_json("/customers", &[("email", email), ("limit", "1")], "list customers")
            .await?;

        Ok(customers.data.into_iter().next().map(|customer| customer.id))
    }

    pub async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        user_id: Uuid,
    ) -> Result<String> {
        // See Stripe customer docs: https://stripe.com/docs/api/customers/create
        let mut body = vec![
            ("email".to_string(), email.to_string()),
            ("metadata[userId]".to_string(), user_id.to_string()),
        ];
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            body.push(("name".to_string(), name.to_string()));
        }

        #[derive(Deserialize)]
        struct CustomerResp {
            id: String,
        }

        let parsed: CustomerResp = self.post_form("/customers", &body, "create customer").await?;
        Ok(parsed.id)
    }

    pub async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<()> {
        // https://stripe.com/docs/api/payment_methods/attach
        let body = [("customer".to_string(), customer_id.to_string())];
        self.post_form::<serde_json::Value>(
            &format!("/payment_methods/{payment_method_id}/attach"),
            &body,
            "attach payment method",
        )
        .await?;

        Ok(())
    }

    pub async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<()> {
        let body = [(
            "invoice_settings[default_payment_method]".to_string(),
            payment_method_id.to_string(),
        )];
        self.post_form::<serde_json::Value>(
            &format!("/customers/{customer_id}"),
            &body,
            "set default payment method",
        )
        .await?;

        Ok(())
    }

    /// Creates a Checkout Session; the caller redirects to its URL.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<StripeCheckoutSession> {
        // Stripe Checkout docs:
        // https://stripe.com/docs/payments/checkout
        let session: StripeCheckoutSession = self
            .post_form(
                "/checkout/sessions",
                &request.form_body(),
                "create checkout session",
            )
            .await?;

        if session.url.is_none() {
            anyhow::bail!("Stripe Checkout session URL is missing");
        }

        Ok(session)
    }

    pub async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<StripeSubscription> {
        // https://stripe.com/docs/api/subscriptions/create
        let mut body = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("items[0][price]".to_string(), price_id.to_string()),
            (
                "payment_settings[payment_method_types][0]".to_string(),
                "card".to_string(),
            ),
            (
                "payment_settings[save_default_payment_method]".to_string(),
                "on_subscription".to_string(),
            ),
            (
                "expand[0]".to_string(),
                "latest_invoice.payment_intent".to_string(),
            ),
        ];
        for (key, value) in metadata {
            body.push((format!("metadata[{}]", key), value.clone()));
        }

        self.post_form("/subscriptions", &body, "create subscription")
            .await
    }

    pub async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        // https://stripe.com/docs/api/subscriptions/retrieve
        self.get_json(
            &format!("/subscriptions/{subscription_id}"),
            &[],
            "retrieve subscription",
        )
        .await
    }

    /// Swaps the price of a subscription item in place, prorating the difference.
    /// `metadata[planName]` moves along so later webhook deliveries carry the new plan.
    pub async fn update_subscription_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &str,
        plan_name: &str,
    ) -> Result<StripeSubscription> {
        // https://stripe.com/docs/billing/subscriptions/upgrade-downgrade
        let body = price_swap_form(item_id, price_id, plan_name);

        self.post_form(
            &format!("/subscriptions/{subscription_id}"),
            &body,
            "update subscription price",
        )
        .await
    }

    /// Marks a Stripe subscription to cancel (or stop cancelling) at period end.
    pub async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<StripeSubscription> {
        // https://stripe.com/docs/api/subscriptions/cancel#cancel_subscription-at_period_end
        let body = [(
            "cancel_at_period_end".to_string(),
            cancel_at_period_end.to_string(),
        )];

        self.post_form(
            &format!("/subscriptions/{subscription_id}"),
            &body,
            "set cancel at period end",
        )
        .await
    }

    pub async fn retrieve_price(&self, price_id: &str) -> Result<StripePrice> {
        self.get_json(&format!("/prices/{price_id}"), &[], "retrieve price")
            .await
    }

    pub async fn list_active_products(&self) -> Result<Vec<StripeProduct>> {
        let products: StripeList<StripeProduct> = self
            .get_json(
                "/products",
                &[("active", "true"), ("limit", "100")],
                "list products",
            )
            .await?;

        Ok(products.data)
    }

    pub async fn list_prices(&self, product_id: &str) -> Result<Vec<StripePrice>> {
        let prices: StripeList<StripePrice> = self
            .get_json(
                "/prices",
                &[("product", product_id), ("active", "true"), ("limit", "100")],
                "list prices",
            )
            .await?;

        Ok(prices.data)
    }

    pub async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String> {
        // https://stripe.com/docs/api/customer_portal/sessions/create
        let body = [
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];

        #[derive(Deserialize)]
        struct PortalResp {
            url: String,
        }

        let parsed: PortalResp = self
            .post_form("/billing_portal/sessions", &body, "create billing portal session")
            .await?;
        Ok(parsed.url)
    }

    /// Verifies the webhook signature. https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        verify_signature(
            payload,
            signature_header,
            &self.webhook_secret,
            Utc::now().timestamp(),
        )?;

        let event: StripeEvent =
            serde_json::from_slice(payload).context("webhook payload is not a Stripe event")?;
        Ok(event)
    }

    pub fn extract_checkout_session(event: &StripeEvent) -> Option<StripeCheckoutSession> {
        serde_json::from_value(event.data.object.clone()).ok()
    }

    pub fn extract_subscription(event: &StripeEvent) -> Option<StripeSubscription> {
        serde_json::from_value(event.data.object.clone()).ok()
    }
}

/// Checks a `t=<unix>,v1=<hex>[,v1=<hex>]` header against the payload.
fn price_swap_form(item_id: &str, price_id: &str, plan_name: &str) -> Vec<(String, String)> {
    vec![
        ("items[0][id]".to_string(), item_id.to_string()),
        ("items[0][price]".to_string(), price_id.to_string()),
        (
            "proration_behavior".to_string(),
            "create_prorations".to_string(),
        ),
        ("cancel_at_period_end".to_string(), "false".to_string()),
        ("metadata[planName]".to_string(), plan_name.to_string()),
    ]
}

pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    webhook_secret: &str,
    now: i64,
) -> Result<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp = timestamp.context("missing timestamp in stripe-signature")?;
    if signatures.is_empty() {
        anyhow::bail!("missing v1 in stripe-signature");
    }

    let issued_at: i64 = timestamp
        .parse()
        .context("invalid timestamp in stripe-signature")?;
    if now.abs_diff(issued_at) > WEBHOOK_TOLERANCE_SECS.unsigned_abs() {
        anyhow::bail!("timestamp outside the tolerance zone");
    }

    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = mac.finalize().into_bytes();

    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|provided| bool::from(expected.as_slice().ct_eq(provided.as_slice())))
            .unwrap_or(false)
    });

    if !matched {
        anyhow::bail!("no signatures found matching the expected signature for payload");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = br#"{"id":"evt_1","type":"invoice.payment_succeeded","data":{"object":{}}}"#;
        let header = format!("t=1700000000,v1={}", sign(payload, 1_700_000_000));

        assert!(verify_signature(payload, &header, SECRET, 1_700_000_010).is_ok());
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let payload = b"{}";
        let header = format!(
            "t=1700000000,v1={},v1={}",
            "00".repeat(32),
            sign(payload, 1_700_000_000)
        );

        assert!(verify_signature(payload, &header, SECRET, 1_700_000_000).is_ok());
    }

    #[test]
    fn rejects_tampered_payload() {
        let header = format!("t=1700000000,v1={}", sign(b"{}", 1_700_000_000));

        assert!(verify_signature(b"{\"x\":1}", &header, SECRET, 1_700_000_000).is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = b"{}";
        let header = format!("t=1700000000,v1={}", sign(payload, 1_700_000_000));

        let err = verify_signature(payload, &header, SECRET, 1_700_000_000 + 301).unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn rejects_extreme_timestamps() {
        for timestamp in [i64::MIN, i64::MAX] {
            let header = format!("t={timestamp},v1={}", "00".repeat(32));
            let err = verify_signature(b"{}", &header, SECRET, 1_700_000_000).unwrap_err();
            assert!(err.to_string().contains("tolerance"));
        }
    }

    #[test]
    fn price_swap_moves_plan_name_metadata() {
        let body = price_swap_form("si_1", "price_pro", "Pro");

        assert!(body.contains(&("items[0][price]".to_string(), "price_pro".to_string())));
        assert!(body.contains(&("metadata[planName]".to_string(), "Pro".to_string())));
    }

    #[test]
    fn rejects_header_without_parts() {
        assert!(verify_signature(b"{}", "v1=abcd", SECRET, 0).is_err());
        assert!(verify_signature(b"{}", "t=0", SECRET, 0).is_err());
    }

    #[test]
    fn period_falls_back_to_first_item() {
        let subscription: StripeSubscription = serde_json::from_value(serde_json::json!({
            "id": "sub_1",
            "status": "active",
            "items": { "data": [{
                "id": "si_1",
                "current_period_start": 100,
                "current_period_end": 200,
                "price": { "id": "price_1", "currency": "usd", "unit_amount": 999,
                           "recurring": { "interval": "month" } }
            }]}
        }))
        .unwrap();

        assert_eq!(subscription.period_start(), Some(100));
        assert_eq!(subscription.period_end(), Some(200));
        assert_eq!(subscription.first_price().map(|p| p.id.as_str()), Some("price_1"));
        assert_eq!(
            subscription.first_price().and_then(StripePrice::interval),
            Some("month")
        );
    }

    #[test]
    fn reads_client_secret_from_expanded_invoice() {
        let subscription: StripeSubscription = serde_json::from_value(serde_json::json!({
            "id": "sub_1",
            "status": "incomplete",
            "latest_invoice": { "payment_intent": { "client_secret": "pi_secret" } }
        }))
        .unwrap();

        assert_eq!(
            subscription.payment_intent_client_secret().as_deref(),
            Some("pi_secret")
        );
    }

    #[test]
    fn checkout_body_carries_both_metadata_maps() {
        let request = CheckoutSessionRequest {
            customer_id: Some("cus_1".to_string()),
            price_id: "price_1".to_string(),
            success_url: "https://app/ok".to_string(),
            cancel_url: "https://app/cancel".to_string(),
            metadata: HashMap::from([("userId".to_string(), "u1".to_string())]),
            subscription_metadata: HashMap::from([("planName".to_string(), "Pro".to_string())]),
            ..Default::default()
        };

        let body = request.form_body();
        assert!(body.contains(&("mode".to_string(), "subscription".to_string())));
        assert!(body.contains(&("customer".to_string(), "cus_1".to_string())));
        assert!(body.contains(&("metadata[userId]".to_string(), "u1".to_string())));
        assert!(body.contains(&(
            "subscription_data[metadata][planName]".to_string(),
            "Pro".to_string()
        )));
    }

    #[test]
    fn price_product_id_handles_expanded_product() {
        let price: StripePrice = serde_json::from_value(serde_json::json!({
            "id": "price_1", "currency": "usd", "product": { "id": "prod_1" }
        }))
        .unwrap();
        assert_eq!(price.product_id(), Some("prod_1"));
    }
}
