use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use crates::{
    domain::repositories::{
        stripe_meta::StripeMetaRepository, users::UserRepository,
        webhook_events::WebhookEventRepository,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            stripe_meta::StripeMetaPostgres, users::UserPostgres,
            webhook_events::WebhookEventPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use serde_json::json;

use crate::{
    axum_http::error_responses::ApiError,
    usecases::{
        stripe_gateway::StripeGateway,
        subscription_sync::{SubscriptionSyncUseCase, WebhookOutcome},
    },
};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe_client: Arc<StripeClient>) -> Router {
    let subscription_sync_usecase = SubscriptionSyncUseCase::new(
        Arc::new(UserPostgres::new(Arc::clone(&db_pool))),
        Arc::new(StripeMetaPostgres::new(Arc::clone(&db_pool))),
        Arc::new(WebhookEventPostgres::new(Arc::clone(&db_pool))),
        stripe_client,
    );

    router(Arc::new(subscription_sync_usecase))
}

pub fn router<U, M, W, G>(usecase: Arc<SubscriptionSyncUseCase<U, M, W, G>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/stripe", post(stripe_webhook))
        .with_state(usecase)
}

/// Signature verification needs the body exactly as Stripe sent it.
pub async fn stripe_webhook<U, M, W, G>(
    State(usecase): State<Arc<SubscriptionSyncUseCase<U, M, W, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let body = match usecase.handle_stripe_webhook(&body, signature).await? {
        WebhookOutcome::Processed => json!({ "received": true }),
        WebhookOutcome::Duplicate => json!({ "received": true, "duplicate": true }),
    };
    Ok(Json(body))
}
