//! Applies Stripe webhook deliveries to the stored subscription metadata.

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use crates::{
    domain::{
        repositories::{
            stripe_meta::StripeMetaRepository, users::UserRepository,
            webhook_events::WebhookEventRepository,
        },
        value_objects::stripe_meta::StripeMetaPatch,
    },
    payments::stripe_client::{StripeClient, StripeEvent, from_unix},
};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    stripe_gateway::StripeGateway,
    subscriptions::{price_patch, stripe_meta_from_subscription},
};

/// Stripe stops retrying a delivery after three days; ids older than this
/// can no longer come back.
pub const PROCESSED_EVENT_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing stripe signature")]
    MissingSignature,
    #[error("Webhook Error: {0}")]
    InvalidSignature(String),
    #[error("Webhook handler failed")]
    HandlerFailed(#[from] anyhow::Error),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature(_) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::HandlerFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, WebhookError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    Duplicate,
}

pub struct SubscriptionSyncUseCase<U, M, W, G>
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    stripe_meta_repo: Arc<M>,
    webhook_event_repo: Arc<W>,
    stripe_client: Arc<G>,
}

impl<U, M, W, G> SubscriptionSyncUseCase<U, M, W, G>
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        stripe_meta_repo: Arc<M>,
        webhook_event_repo: Arc<W>,
        stripe_client: Arc<G>,
    ) -> Self {
        Self {
            user_repo,
            stripe_meta_repo,
            webhook_event_repo,
            stripe_client,
        }
    }

    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> UseCaseResult<WebhookOutcome> {
        let signature = signature
            .filter(|value| !value.trim().is_empty())
            .ok_or(WebhookError::MissingSignature)?;

        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "stripe_webhook: verification failed");
                WebhookError::InvalidSignature(err.to_string())
            })?;

        let event_id = event.id.clone().filter(|id| !id.is_empty());
        if let Some(event_id) = event_id.as_deref() {
            if self.webhook_event_repo.is_processed(event_id).await? {
                info!(%event_id, event_type = %event.type_, "stripe_webhook: duplicate delivery acknowledged");
                return Ok(WebhookOutcome::Duplicate);
            }
        }

        info!(event_id = ?event_id, event_type = %event.type_, "stripe_webhook: event verified");

        match event.type_.as_str() {
            "checkout.session.completed" => self.handle_checkout_completed(&event).await?,
            "customer.subscription.updated" => self.handle_subscription_updated(&event).await?,
            "customer.subscription.deleted" => self.handle_subscription_deleted(&event).await?,
            "invoice.payment_succeeded" => {
                info!(
                    subscription_id = ?invoice_subscription_id(&event.data.object),
                    "stripe_webhook: invoice paid"
                );
            }
            "invoice.payment_failed" => {
                warn!(
                    subscription_id = ?invoice_subscription_id(&event.data.object),
                    "stripe_webhook: invoice payment failed"
                );
            }
            other => debug!(event_type = other, "stripe_webhook: unhandled event type"),
        }

        if let Some(event_id) = event_id.as_deref() {
            if let Err(err) = self
                .webhook_event_repo
                .mark_processed(event_id, &event.type_)
                .await
            {
                warn!(%event_id, db_error = ?err, "stripe_webhook: failed to record processed event");
            } else {
                self.prune_processed_events().await;
            }
        }

        Ok(WebhookOutcome::Processed)
    }

    async fn prune_processed_events(&self) {
        let cutoff = Utc::now() - Duration::days(PROCESSED_EVENT_RETENTION_DAYS);
        match self
            .webhook_event_repo
            .delete_processed_before(cutoff)
            .await
        {
            Ok(0) => {}
            Ok(deleted) => debug!(deleted, "stripe_webhook: pruned processed events"),
            Err(err) => {
                warn!(db_error = ?err, "stripe_webhook: failed to prune processed events")
            }
        }
    }

    async fn handle_checkout_completed(&self, event: &StripeEvent) -> anyhow::Result<()> {
        let Some(session) = StripeClient::extract_checkout_session(event) else {
            warn!("stripe_webhook: checkout session payload unreadable");
            return Ok(());
        };

        let user_id = session
            .metadata_value("userId")
            .and_then(|value| Uuid::parse_str(value).ok());
        let (Some(user_id), Some(subscription_id)) = (user_id, session.subscription.clone()) else {
            warn!(
                session_id = ?session.id,
                "stripe_webhook: checkout session without user id or subscription, ignored"
            );
            return Ok(());
        };

        let subscription = self
            .stripe_client
            .retrieve_subscription(&subscription_id)
            .await
            .map_err(|err| {
                error!(%user_id, %subscription_id, error = ?err, "stripe_webhook: failed to retrieve subscription");
                err
            })?;

        let customer_id = session
            .customer
            .clone()
            .or_else(|| subscription.customer.clone())
            .unwrap_or_default();
        let plan_name = session
            .metadata_value("planName")
            .map(str::to_string)
            .or_else(|| subscription.metadata.get("planName").cloned());

        let previous = self.stripe_meta_repo.find_by_user_id(user_id).await?;
        let created_at = previous
            .filter(|meta| meta.subscription_id == subscription.id)
            .map(|meta| meta.created_at);

        let meta = stripe_meta_from_subscription(
            &subscription,
            None,
            &customer_id,
            plan_name,
            created_at,
            Utc::now(),
        );
        self.stripe_meta_repo
            .replace(user_id, meta)
            .await
            .map_err(|err| {
                error!(%user_id, %subscription_id, db_error = ?err, "stripe_webhook: failed to store stripe meta");
                err
            })?;

        if !customer_id.is_empty() {
            self.user_repo
                .set_stripe_customer_id(user_id, &customer_id)
                .await?;
        }

        info!(%user_id, %subscription_id, status = %subscription.status, "stripe_webhook: checkout completed");
        Ok(())
    }

    async fn handle_subscription_updated(&self, event: &StripeEvent) -> anyhow::Result<()> {
        let Some(subscription) = StripeClient::extract_subscription(event) else {
            warn!("stripe_webhook: subscription payload unreadable");
            return Ok(());
        };

        let patch = StripeMetaPatch {
            status: subscription.status.clone(),
            current_period_start: subscription.period_start().and_then(from_unix),
            current_period_end: subscription.period_end().and_then(from_unix),
            cancel_at_period_end: subscription.cancel_at_period_end,
            price: subscription.first_price().map(price_patch),
            plan_name: subscription.metadata.get("planName").cloned(),
        };

        let matched = self
            .stripe_meta_repo
            .patch_by_subscription_id(&subscription.id, patch)
            .await
            .map_err(|err| {
                error!(subscription_id = %subscription.id, db_error = ?err, "stripe_webhook: failed to patch stripe meta");
                err
            })?;

        if matched {
            info!(subscription_id = %subscription.id, status = %subscription.status, "stripe_webhook: subscription updated");
        } else {
            warn!(subscription_id = %subscription.id, "stripe_webhook: no user carries the updated subscription");
        }
        Ok(())
    }

    async fn handle_subscription_deleted(&self, event: &StripeEvent) -> anyhow::Result<()> {
        let Some(subscription_id) = event
            .data
            .object
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            warn!("stripe_webhook: deleted subscription without id");
            return Ok(());
        };

        let matched = self
            .stripe_meta_repo
            .mark_cancelled(&subscription_id, Utc::now())
            .await?;

        if matched {
            info!(%subscription_id, "stripe_webhook: subscription cancelled");
        } else {
            warn!(%subscription_id, "stripe_webhook: no user carries the deleted subscription");
        }
        Ok(())
    }
}

fn invoice_subscription_id(invoice: &Value) -> Option<String> {
    invoice
        .get("subscription")
        .and_then(Value::as_str)
        .or_else(|| {
            invoice
                .pointer("/parent/subscription_details/subscription")
                .and_then(Value::as_str)
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{
        stripe_gateway::MockStripeGateway, subscriptions::test_support::stripe_subscription,
    };
    use anyhow::anyhow;
    use chrono::{Duration, TimeZone};
    use crates::domain::{
        repositories::{
            stripe_meta::MockStripeMetaRepository, users::MockUserRepository,
            webhook_events::MockWebhookEventRepository,
        },
        value_objects::stripe_meta::StripeMeta,
    };
    use mockall::predicate::eq;
    use serde_json::json;

    type TestUseCase = SubscriptionSyncUseCase<
        MockUserRepository,
        MockStripeMetaRepository,
        MockWebhookEventRepository,
        MockStripeGateway,
    >;

    fn usecase(
        users: MockUserRepository,
        metas: MockStripeMetaRepository,
        events: MockWebhookEventRepository,
        stripe: MockStripeGateway,
    ) -> TestUseCase {
        SubscriptionSyncUseCase::new(
            Arc::new(users),
            Arc::new(metas),
            Arc::new(events),
            Arc::new(stripe),
        )
    }

    fn event(id: &str, type_: &str, object: Value) -> StripeEvent {
        serde_json::from_value(json!({
            "id": id,
            "type": type_,
            "data": { "object": object }
        }))
        .unwrap()
    }

    fn gateway_returning(event: StripeEvent) -> MockStripeGateway {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(event.clone()));
        stripe
    }

    fn fresh_events() -> MockWebhookEventRepository {
        let mut events = MockWebhookEventRepository::new();
        events.expect_is_processed().returning(|_| Ok(false));
        events.expect_mark_processed().returning(|_, _| Ok(()));
        events.expect_delete_processed_before().returning(|_| Ok(0));
        events
    }

    fn stored_meta(subscription_id: &str) -> StripeMeta {
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        StripeMeta {
            subscription_id: subscription_id.to_string(),
            customer_id: "cus_1".to_string(),
            price_id: "price_old".to_string(),
            plan_name: Some("Basic".to_string()),
            status: "active".to_string(),
            amount: 10.0,
            currency: "usd".to_string(),
            interval: "month".to_string(),
            current_period_start: created,
            current_period_end: created + Duration::days(30),
            cancel_at_period_end: false,
            created_at: created,
            updated_at: created,
            cancelled_at: None,
        }
    }

    #[tokio::test]
    async fn missing_signature_is_bad_request() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_verify_webhook_signature().never();

        let err = usecase(
            MockUserRepository::new(),
            MockStripeMetaRepository::new(),
            MockWebhookEventRepository::new(),
            stripe,
        )
        .handle_stripe_webhook(b"{}", None)
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "Missing stripe signature");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_signature_reports_reason() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .returning(|_, _| Err(anyhow!("no matching signature")));

        let err = usecase(
            MockUserRepository::new(),
            MockStripeMetaRepository::new(),
            MockWebhookEventRepository::new(),
            stripe,
        )
        .handle_stripe_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "Webhook Error: no matching signature");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_delivery_is_not_reapplied() {
        let stripe = gateway_returning(event(
            "evt_1",
            "customer.subscription.deleted",
            json!({ "id": "sub_1" }),
        ));
        let mut events = MockWebhookEventRepository::new();
        events
            .expect_is_processed()
            .with(eq("evt_1"))
            .returning(|_| Ok(true));
        events.expect_mark_processed().never();
        let mut metas = MockStripeMetaRepository::new();
        metas.expect_mark_cancelled().never();

        let outcome = usecase(MockUserRepository::new(), metas, events, stripe)
            .handle_stripe_webhook(b"{}", Some("sig"))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Duplicate);
    }

    #[tokio::test]
    async fn checkout_completed_replaces_meta_and_keeps_created_at_for_same_subscription() {
        let user_id = Uuid::new_v4();
        let stripe_event = event(
            "evt_2",
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "mode": "subscription",
                "subscription": "sub_1",
                "customer": "cus_1",
                "metadata": { "userId": user_id.to_string(), "planName": "Pro" }
            }),
        );
        let mut stripe = gateway_returning(stripe_event);
        stripe
            .expect_retrieve_subscription()
            .with(eq("sub_1"))
            .returning(|id| Ok(stripe_subscription(id, "active", "price_pro_m")));

        let original_created = stored_meta("sub_1").created_at;
        let mut metas = MockStripeMetaRepository::new();
        metas
            .expect_find_by_user_id()
            .with(eq(user_id))
            .returning(|_| Ok(Some(stored_meta("sub_1"))));
        metas
            .expect_replace()
            .withf(move |id, meta| {
                *id == user_id
                    && meta.subscription_id == "sub_1"
                    && meta.price_id == "price_pro_m"
                    && meta.amount == 25.0
                    && meta.plan_name.as_deref() == Some("Pro")
                    && meta.created_at == original_created
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut users = MockUserRepository::new();
        users
            .expect_set_stripe_customer_id()
            .withf(move |id, customer| *id == user_id && customer == "cus_1")
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = usecase(users, metas, fresh_events(), stripe)
            .handle_stripe_webhook(b"{}", Some("sig"))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
    }

    #[tokio::test]
    async fn checkout_completed_resets_created_at_for_new_subscription() {
        let user_id = Uuid::new_v4();
        let stripe_event = event(
            "evt_3",
            "checkout.session.completed",
            json!({
                "id": "cs_2",
                "subscription": "sub_new",
                "customer": "cus_1",
                "metadata": { "userId": user_id.to_string() }
            }),
        );
        let mut stripe = gateway_returning(stripe_event);
        stripe
            .expect_retrieve_subscription()
            .returning(|id| Ok(stripe_subscription(id, "active", "price_pro_m")));

        let original_created = stored_meta("sub_old").created_at;
        let mut metas = MockStripeMetaRepository::new();
        metas
            .expect_find_by_user_id()
            .returning(|_| Ok(Some(stored_meta("sub_old"))));
        metas
            .expect_replace()
            .withf(move |_, meta| meta.subscription_id == "sub_new" && meta.created_at > original_created)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut users = MockUserRepository::new();
        users
            .expect_set_stripe_customer_id()
            .returning(|_, _| Ok(()));

        usecase(users, metas, fresh_events(), stripe)
            .handle_stripe_webhook(b"{}", Some("sig"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn checkout_without_user_id_is_ignored() {
        let mut stripe = gateway_returning(event(
            "evt_4",
            "checkout.session.completed",
            json!({ "id": "cs_3", "subscription": "sub_1" }),
        ));
        stripe.expect_retrieve_subscription().never();
        let mut metas = MockStripeMetaRepository::new();
        metas.expect_replace().never();

        let outcome = usecase(MockUserRepository::new(), metas, fresh_events(), stripe)
            .handle_stripe_webhook(b"{}", Some("sig"))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
    }

    #[tokio::test]
    async fn subscription_updated_patches_status_periods_and_price() {
        let stripe = gateway_returning(event(
            "evt_5",
            "customer.subscription.updated",
            json!({
                "id": "sub_1",
                "status": "past_due",
                "cancel_at_period_end": true,
                "items": { "data": [{
                    "id": "si_1",
                    "current_period_start": 1_735_689_600,
                    "current_period_end": 1_738_368_000,
                    "price": {
                        "id": "price_pro_y",
                        "active": true,
                        "unit_amount": 19900,
                        "currency": "usd",
                        "recurring": { "interval": "year", "interval_count": 1 }
                    }
                }]}
            }),
        ));

        let mut metas = MockStripeMetaRepository::new();
        metas
            .expect_patch_by_subscription_id()
            .withf(|id, patch| {
                let price = patch.price.as_ref().unwrap();
                id == "sub_1"
                    && patch.status == "past_due"
                    && patch.cancel_at_period_end
                    && patch.current_period_end.map(|end| end.timestamp()) == Some(1_738_368_000)
                    && price.price_id == "price_pro_y"
                    && price.amount == 199.0
                    && price.interval == "year"
            })
            .times(1)
            .returning(|_, _| Ok(true));

        usecase(MockUserRepository::new(), metas, fresh_events(), stripe)
            .handle_stripe_webhook(b"{}", Some("sig"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn stale_plan_metadata_keeps_upgraded_plan_name() {
        let stripe = gateway_returning(event(
            "evt_6",
            "customer.subscription.updated",
            json!({
                "id": "sub_1",
                "status": "active",
                "metadata": { "planName": "Basic" },
                "items": { "data": [{
                    "id": "si_1",
                    "price": {
                        "id": "price_pro_m",
                        "unit_amount": 2500,
                        "currency": "usd",
                        "recurring": { "interval": "month" }
                    }
                }]}
            }),
        ));

        let stored = Arc::new(std::sync::Mutex::new({
            let mut meta = stored_meta("sub_1");
            meta.price_id = "price_pro_m".to_string();
            meta.plan_name = Some("Pro".to_string());
            meta
        }));
        let mut metas = MockStripeMetaRepository::new();
        let target = Arc::clone(&stored);
        metas
            .expect_patch_by_subscription_id()
            .with(eq("sub_1"), mockall::predicate::always())
            .times(1)
            .returning(move |_, patch| {
                target.lock().unwrap().apply_patch(patch, Utc::now());
                Ok(true)
            });

        usecase(MockUserRepository::new(), metas, fresh_events(), stripe)
            .handle_stripe_webhook(b"{}", Some("sig"))
            .await
            .unwrap();

        let meta = stored.lock().unwrap();
        assert_eq!(meta.price_id, "price_pro_m");
        assert_eq!(meta.plan_name.as_deref(), Some("Pro"));
    }

    #[tokio::test]
    async fn subscription_deleted_marks_cancelled() {
        let stripe = gateway_returning(event(
            "evt_6",
            "customer.subscription.deleted",
            json!({ "id": "sub_1", "status": "canceled" }),
        ));
        let mut metas = MockStripeMetaRepository::new();
        metas
            .expect_mark_cancelled()
            .withf(|id, _| id == "sub_1")
            .times(1)
            .returning(|_, _| Ok(true));
        let mut events = MockWebhookEventRepository::new();
        events.expect_is_processed().returning(|_| Ok(false));
        events
            .expect_mark_processed()
            .with(eq("evt_6"), eq("customer.subscription.deleted"))
            .times(1)
            .returning(|_, _| Ok(()));
        events
            .expect_delete_processed_before()
            .withf(|cutoff| {
                let age = Utc::now() - *cutoff;
                age >= Duration::days(PROCESSED_EVENT_RETENTION_DAYS)
                    && age < Duration::days(PROCESSED_EVENT_RETENTION_DAYS) + Duration::minutes(1)
            })
            .times(1)
            .returning(|_| Ok(4));

        usecase(MockUserRepository::new(), metas, events, stripe)
            .handle_stripe_webhook(b"{}", Some("sig"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn handler_failure_is_internal_and_not_marked_processed() {
        let stripe = gateway_returning(event(
            "evt_7",
            "customer.subscription.deleted",
            json!({ "id": "sub_1" }),
        ));
        let mut metas = MockStripeMetaRepository::new();
        metas
            .expect_mark_cancelled()
            .returning(|_, _| Err(anyhow!("connection reset")));
        let mut events = MockWebhookEventRepository::new();
        events.expect_is_processed().returning(|_| Ok(false));
        events.expect_mark_processed().never();

        let err = usecase(MockUserRepository::new(), metas, events, stripe)
            .handle_stripe_webhook(b"{}", Some("sig"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Webhook handler failed");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn invoice_events_are_acknowledged_without_writes() {
        let stripe = gateway_returning(event(
            "evt_8",
            "invoice.payment_failed",
            json!({ "id": "in_1", "subscription": "sub_1" }),
        ));

        let outcome = usecase(
            MockUserRepository::new(),
            MockStripeMetaRepository::new(),
            fresh_events(),
            stripe,
        )
        .handle_stripe_webhook(b"{}", Some("sig"))
        .await
        .unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
    }

    #[tokio::test]
    async fn prune_failure_still_acknowledges_delivery() {
        let stripe = gateway_returning(event(
            "evt_9",
            "invoice.payment_succeeded",
            json!({ "id": "in_2", "subscription": "sub_1" }),
        ));
        let mut events = MockWebhookEventRepository::new();
        events.expect_is_processed().returning(|_| Ok(false));
        events.expect_mark_processed().returning(|_, _| Ok(()));
        events
            .expect_delete_processed_before()
            .times(1)
            .returning(|_| Err(anyhow!("statement timeout")));

        let outcome = usecase(
            MockUserRepository::new(),
            MockStripeMetaRepository::new(),
            events,
            stripe,
        )
        .handle_stripe_webhook(b"{}", Some("sig"))
        .await
        .unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
    }

    #[tokio::test]
    async fn failed_mark_skips_pruning() {
        let stripe = gateway_returning(event(
            "evt_10",
            "invoice.payment_succeeded",
            json!({ "id": "in_3" }),
        ));
        let mut events = MockWebhookEventRepository::new();
        events.expect_is_processed().returning(|_| Ok(false));
        events
            .expect_mark_processed()
            .returning(|_, _| Err(anyhow!("connection reset")));
        events.expect_delete_processed_before().never();

        let outcome = usecase(
            MockUserRepository::new(),
            MockStripeMetaRepository::new(),
            events,
            stripe,
        )
        .handle_stripe_webhook(b"{}", Some("sig"))
        .await
        .unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
    }

    #[test]
    fn invoice_subscription_id_reads_new_api_shape() {
        let invoice = json!({
            "parent": { "subscription_details": { "subscription": "sub_9" } }
        });
        assert_eq!(invoice_subscription_id(&invoice).as_deref(), Some("sub_9"));
    }
}
