use std::{collections::HashMap, sync::Arc};

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use crates::{
    domain::{
        repositories::{stripe_meta::StripeMetaRepository, users::UserRepository},
        value_objects::{
            plans::{PlanDto, PlanPriceDto, RecurringDto, sort_by_lowest_price},
            stripe_meta::{
                DEFAULT_INTERVAL, PricePatch, StripeMeta, StripeMetaPatch, amount_from_minor,
            },
            subscription_status::SubscriptionStatusSummary,
        },
    },
    payments::stripe_client::{
        CheckoutSessionRequest, StripePrice, StripeSubscription, from_unix,
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;

use super::{
    plan_change::{PlanChange, decide_plan_change, resolve_plan_price},
    stripe_gateway::StripeGateway,
};

const DEFAULT_CURRENCY: &str = "usd";

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("{0}")]
    MissingField(&'static str),
    #[error("Plan not found")]
    PlanNotFound,
    #[error("Already subscribed to this plan")]
    AlreadySubscribed,
    #[error("No active subscription found")]
    NoSubscription,
    #[error("User not found")]
    UserNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SubscriptionError::MissingField(_)
            | SubscriptionError::PlanNotFound
            | SubscriptionError::AlreadySubscribed => StatusCode::BAD_REQUEST,
            SubscriptionError::NoSubscription | SubscriptionError::UserNotFound => {
                StatusCode::NOT_FOUND
            }
            SubscriptionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutModel {
    pub price_id: Option<String>,
    pub plan_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionModel {
    pub price_id: Option<String>,
    pub payment_method_id: Option<String>,
    pub plan_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeModel {
    pub plan: Option<String>,
    #[serde(default)]
    pub annual: bool,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub disable_redirect: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDto {
    pub session_id: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSubscriptionDto {
    pub subscription_id: String,
    pub client_secret: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UpgradeOutcome {
    Checkout {
        url: Option<String>,
        redirect: bool,
    },
    #[serde(rename_all = "camelCase")]
    Upgraded {
        upgraded: bool,
        subscription_id: String,
        status: String,
    },
}

/// Builds the stored document from a provider subscription.
pub fn stripe_meta_from_subscription(
    subscription: &StripeSubscription,
    price: Option<&StripePrice>,
    customer_id: &str,
    plan_name: Option<String>,
    created_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> StripeMeta {
    let price = price.or_else(|| subscription.first_price());

    StripeMeta {
        subscription_id: subscription.id.clone(),
        customer_id: customer_id.to_string(),
        price_id: price.map(|price| price.id.clone()).unwrap_or_default(),
        plan_name: plan_name.filter(|name| !name.is_empty()),
        status: subscription.status.clone(),
        amount: amount_from_minor(price.and_then(|price| price.unit_amount)),
        currency: price
            .map(|price| price.currency.clone())
            .filter(|currency| !currency.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        interval: price
            .and_then(StripePrice::interval)
            .unwrap_or(DEFAULT_INTERVAL)
            .to_string(),
        current_period_start: subscription
            .period_start()
            .and_then(from_unix)
            .unwrap_or(now),
        current_period_end: subscription.period_end().and_then(from_unix).unwrap_or(now),
        cancel_at_period_end: subscription.cancel_at_period_end,
        created_at: created_at.unwrap_or(now),
        updated_at: now,
        cancelled_at: None,
    }
}

pub fn price_patch(price: &StripePrice) -> PricePatch {
    PricePatch {
        price_id: price.id.clone(),
        amount: amount_from_minor(price.unit_amount),
        currency: price.currency.clone(),
        interval: price.interval().unwrap_or(DEFAULT_INTERVAL).to_string(),
    }
}

fn plan_price(price: StripePrice) -> PlanPriceDto {
    PlanPriceDto {
        id: price.id,
        unit_amount: price.unit_amount,
        currency: price.currency,
        recurring: price.recurring.map(|recurring| RecurringDto {
            interval: recurring.interval,
            interval_count: recurring.interval_count,
        }),
    }
}

fn required(value: Option<String>, message: &'static str) -> UseCaseResult<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(SubscriptionError::MissingField(message))
}

pub struct SubscriptionUseCase<U, M, G>
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    stripe_meta_repo: Arc<M>,
    stripe_client: Arc<G>,
    app_url: String,
}

impl<U, M, G> SubscriptionUseCase<U, M, G>
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        stripe_meta_repo: Arc<M>,
        stripe_client: Arc<G>,
        app_url: String,
    ) -> Self {
        Self {
            user_repo,
            stripe_meta_repo,
            stripe_client,
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn list_plans(&self) -> UseCaseResult<Vec<PlanDto>> {
        let products = self.stripe_client.list_active_products().await.map_err(|err| {
            error!(error = ?err, "subscriptions: failed to list products");
            SubscriptionError::Internal(err)
        })?;

        let mut plans = Vec::with_capacity(products.len());
        for product in products {
            let prices = self
                .stripe_client
                .list_prices(&product.id)
                .await
                .map_err(|err| {
                    error!(product_id = %product.id, error = ?err, "subscriptions: failed to list prices");
                    SubscriptionError::Internal(err)
                })?;

            plans.push(PlanDto {
                id: product.id,
                name: product.name,
                description: product.description,
                active: product.active,
                metadata: product.metadata,
                prices: prices
                    .into_iter()
                    .filter(|price| price.active)
                    .map(plan_price)
                    .collect(),
            });
        }

        sort_by_lowest_price(&mut plans);
        info!(plan_count = plans.len(), "subscriptions: plans loaded");
        Ok(plans)
    }

    /// Stored customer id, else the first customer with the user's email,
    /// else a new customer. The result is persisted on the user.
    async fn resolve_customer(&self, user: &AuthUser) -> UseCaseResult<String> {
        let stored = self
            .user_repo
            .find_by_id(user.user_id)
            .await?
            .ok_or(SubscriptionError::UserNotFound)?
            .stripe_customer_id
            .filter(|id| !id.is_empty());
        if let Some(customer_id) = stored {
            return Ok(customer_id);
        }

        let customer_id = match self.stripe_client.find_customer_by_email(&user.email).await? {
            Some(existing) => {
                info!(user_id = %user.user_id, customer_id = %existing, "subscriptions: reusing customer found by email");
                existing
            }
            None => {
                let created = self
                    .stripe_client
                    .create_customer(&user.email, Some(user.name.clone()), user.user_id)
                    .await
                    .map_err(|err| {
                        error!(user_id = %user.user_id, error = ?err, "subscriptions: failed to create customer");
                        SubscriptionError::Internal(err)
                    })?;
                info!(user_id = %user.user_id, customer_id = %created, "subscriptions: customer created");
                created
            }
        };

        self.user_repo
            .set_stripe_customer_id(user.user_id, &customer_id)
            .await
            .map_err(|err| {
                error!(user_id = %user.user_id, db_error = ?err, "subscriptions: failed to persist customer id");
                SubscriptionError::Internal(err)
            })?;

        Ok(customer_id)
    }

    fn checkout_metadata(
        user: &AuthUser,
        plan_name: Option<&str>,
    ) -> (HashMap<String, String>, HashMap<String, String>) {
        let plan_name = plan_name.unwrap_or_default().to_string();
        let metadata = HashMap::from([
            ("userId".to_string(), user.user_id.to_string()),
            ("userEmail".to_string(), user.email.clone()),
            ("planName".to_string(), plan_name.clone()),
        ]);
        let subscription_metadata = HashMap::from([
            ("userId".to_string(), user.user_id.to_string()),
            ("planName".to_string(), plan_name),
        ]);
        (metadata, subscription_metadata)
    }

    pub async fn create_checkout(
        &self,
        user: &AuthUser,
        model: CreateCheckoutModel,
    ) -> UseCaseResult<CheckoutDto> {
        let price_id = required(model.price_id, "Price ID is required")?;
        let customer_id = self.resolve_customer(user).await?;
        let (metadata, subscription_metadata) =
            Self::checkout_metadata(user, model.plan_name.as_deref());

        let session = self
            .stripe_client
            .create_checkout_session(CheckoutSessionRequest {
                customer_id: Some(customer_id),
                customer_email: None,
                price_id: price_id.clone(),
                success_url: format!(
                    "{}/?success=true&session_id={{CHECKOUT_SESSION_ID}}",
                    self.app_url
                ),
                cancel_url: format!("{}/plans?canceled=true", self.app_url),
                metadata,
                subscription_metadata,
            })
            .await
            .map_err(|err| {
                error!(user_id = %user.user_id, %price_id, error = ?err, "subscriptions: failed to create checkout session");
                SubscriptionError::Internal(err)
            })?;

        info!(user_id = %user.user_id, %price_id, "subscriptions: checkout session created");
        Ok(CheckoutDto {
            session_id: session.id,
            url: session.url,
        })
    }

    pub async fn create_subscription(
        &self,
        user: &AuthUser,
        model: CreateSubscriptionModel,
    ) -> UseCaseResult<CreatedSubscriptionDto> {
        let missing = "Price ID and Payment Method ID are required";
        let price_id = required(model.price_id, missing)?;
        let payment_method_id = required(model.payment_method_id, missing)?;

        let customer_id = self.resolve_customer(user).await?;

        self.stripe_client
            .attach_payment_method(&payment_method_id, &customer_id)
            .await?;
        self.stripe_client
            .set_default_payment_method(&customer_id, &payment_method_id)
            .await?;

        let metadata = HashMap::from([
            ("userId".to_string(), user.user_id.to_string()),
            (
                "planName".to_string(),
                model.plan_name.clone().unwrap_or_default(),
            ),
        ]);
        let subscription = self
            .stripe_client
            .create_subscription(&customer_id, &price_id, metadata)
            .await
            .map_err(|err| {
                error!(user_id = %user.user_id, %price_id, error = ?err, "subscriptions: failed to create subscription");
                SubscriptionError::Internal(err)
            })?;
        let price = self.stripe_client.retrieve_price(&price_id).await?;

        let meta = stripe_meta_from_subscription(
            &subscription,
            Some(&price),
            &customer_id,
            model.plan_name,
            None,
            Utc::now(),
        );
        self.stripe_meta_repo
            .replace(user.user_id, meta)
            .await
            .map_err(|err| {
                error!(user_id = %user.user_id, subscription_id = %subscription.id, db_error = ?err, "subscriptions: failed to store stripe meta");
                SubscriptionError::Internal(err)
            })?;

        info!(user_id = %user.user_id, subscription_id = %subscription.id, status = %subscription.status, "subscriptions: subscription created");
        Ok(CreatedSubscriptionDto {
            client_secret: subscription.payment_intent_client_secret(),
            subscription_id: subscription.id,
            status: subscription.status,
        })
    }

    pub async fn upgrade(&self, user: &AuthUser, model: UpgradeModel) -> UseCaseResult<UpgradeOutcome> {
        let plan = required(model.plan, "Plan is required")?;
        let urls_missing = "Success URL and Cancel URL are required";
        let success_url = required(model.success_url, urls_missing)?;
        let cancel_url = required(model.cancel_url, urls_missing)?;

        let plans = self.list_plans().await?;
        let (target_plan, target_price) =
            resolve_plan_price(&plans, &plan, model.annual).ok_or_else(|| {
                warn!(user_id = %user.user_id, %plan, annual = model.annual, "subscriptions: requested plan not found");
                SubscriptionError::PlanNotFound
            })?;

        let current = self.stripe_meta_repo.find_by_user_id(user.user_id).await?;

        match decide_plan_change(current.as_ref(), &target_price.id) {
            PlanChange::AlreadySubscribed => {
                warn!(user_id = %user.user_id, price_id = %target_price.id, "subscriptions: already on requested price");
                Err(SubscriptionError::AlreadySubscribed)
            }
            PlanChange::Checkout => {
                let customer_id = self.resolve_customer(user).await?;
                let (mut metadata, subscription_metadata) =
                    Self::checkout_metadata(user, Some(&target_plan.name));
                for (key, value) in model.metadata {
                    metadata.entry(key).or_insert(value);
                }

                let session = self
                    .stripe_client
                    .create_checkout_session(CheckoutSessionRequest {
                        customer_id: Some(customer_id),
                        customer_email: None,
                        price_id: target_price.id.clone(),
                        success_url,
                        cancel_url,
                        metadata,
                        subscription_metadata,
                    })
                    .await?;

                info!(user_id = %user.user_id, price_id = %target_price.id, "subscriptions: upgrade routed to checkout");
                Ok(UpgradeOutcome::Checkout {
                    url: session.url,
                    redirect: !model.disable_redirect.unwrap_or(true),
                })
            }
            PlanChange::SwapPrice { subscription_id } => {
                let existing = self
                    .stripe_client
                    .retrieve_subscription(&subscription_id)
                    .await?;
                let item_id = existing
                    .first_item()
                    .map(|item| item.id.clone())
                    .ok_or_else(|| {
                        anyhow::anyhow!("subscription {subscription_id} has no items to swap")
                    })?;

                let updated = self
                    .stripe_client
                    .update_subscription_price(
                        &subscription_id,
                        &item_id,
                        &target_price.id,
                        &target_plan.name,
                    )
                    .await
                    .map_err(|err| {
                        error!(user_id = %user.user_id, %subscription_id, error = ?err, "subscriptions: failed to swap price");
                        SubscriptionError::Internal(err)
                    })?;

                let price = self.stripe_client.retrieve_price(&target_price.id).await?;
                self.stripe_meta_repo
                    .patch_by_subscription_id(
                        &subscription_id,
                        StripeMetaPatch {
                            status: updated.status.clone(),
                            current_period_start: updated.period_start().and_then(from_unix),
                            current_period_end: updated.period_end().and_then(from_unix),
                            cancel_at_period_end: updated.cancel_at_period_end,
                            price: Some(price_patch(&price)),
                            plan_name: Some(target_plan.name.clone()),
                        },
                    )
                    .await?;

                info!(user_id = %user.user_id, %subscription_id, price_id = %target_price.id, "subscriptions: upgraded in place");
                Ok(UpgradeOutcome::Upgraded {
                    upgraded: true,
                    subscription_id,
                    status: updated.status,
                })
            }
        }
    }

    pub async fn status(&self, user_id: Uuid) -> UseCaseResult<SubscriptionStatusSummary> {
        let meta = self
            .stripe_meta_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to load stripe meta");
                SubscriptionError::Internal(err)
            })?;
        Ok(SubscriptionStatusSummary::from_meta(meta.as_ref(), Utc::now()))
    }

    pub async fn cancel(&self, user_id: Uuid) -> UseCaseResult<()> {
        self.set_cancel_at_period_end(user_id, true).await
    }

    pub async fn reactivate(&self, user_id: Uuid) -> UseCaseResult<()> {
        self.set_cancel_at_period_end(user_id, false).await
    }

    async fn set_cancel_at_period_end(&self, user_id: Uuid, cancel: bool) -> UseCaseResult<()> {
        let meta = self
            .stripe_meta_repo
            .find_by_user_id(user_id)
            .await?
            .filter(|meta| !meta.subscription_id.is_empty())
            .ok_or(SubscriptionError::NoSubscription)?;

        self.stripe_client
            .set_cancel_at_period_end(&meta.subscription_id, cancel)
            .await
            .map_err(|err| {
                error!(%user_id, subscription_id = %meta.subscription_id, error = ?err, "subscriptions: failed to update cancellation");
                SubscriptionError::Internal(err)
            })?;
        self.stripe_meta_repo
            .set_cancel_at_period_end(user_id, cancel)
            .await?;

        info!(%user_id, subscription_id = %meta.subscription_id, cancel_at_period_end = cancel, "subscriptions: cancellation updated");
        Ok(())
    }

    pub async fn create_portal_session(&self, user: &AuthUser) -> UseCaseResult<String> {
        let customer_id = self.resolve_customer(user).await?;
        let url = self
            .stripe_client
            .create_billing_portal_session(&customer_id, &format!("{}/dashboard", self.app_url))
            .await
            .map_err(|err| {
                error!(user_id = %user.user_id, error = ?err, "subscriptions: failed to create portal session");
                SubscriptionError::Internal(err)
            })?;
        Ok(url)
    }
}
