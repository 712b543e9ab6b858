use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::repositories::{stripe_meta::StripeMetaRepository, users::UserRepository},
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{stripe_meta::StripeMetaPostgres, users::UserPostgres},
    },
    payments::stripe_client::StripeClient,
};
use serde_json::json;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::ApiError,
    config::config_model::DotEnvyConfig,
    usecases::{
        stripe_gateway::StripeGateway,
        subscriptions::{
            CreateCheckoutModel, CreateSubscriptionModel, SubscriptionUseCase, UpgradeModel,
        },
    },
};

pub type PgSubscriptionUseCase = SubscriptionUseCase<UserPostgres, StripeMetaPostgres, StripeClient>;

pub fn usecase(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    config: &DotEnvyConfig,
) -> PgSubscriptionUseCase {
    SubscriptionUseCase::new(
        Arc::new(UserPostgres::new(Arc::clone(&db_pool))),
        Arc::new(StripeMetaPostgres::new(Arc::clone(&db_pool))),
        stripe_client,
        config.stripe.app_url.clone(),
    )
}

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    config: Arc<DotEnvyConfig>,
) -> Router {
    router(Arc::new(usecase(db_pool, stripe_client, &config)))
}

pub fn router<U, M, G>(usecase: Arc<SubscriptionUseCase<U, M, G>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/plans", get(list_plans))
        .route("/create-payment-intent", post(create_payment_intent))
        .route("/create-subscription", post(create_subscription))
        .route("/upgrade", post(upgrade))
        .route("/status", get(status))
        .route("/cancel", post(cancel))
        .route("/reactivate", post(reactivate))
        .with_state(usecase)
}

pub async fn list_plans<U, M, G>(
    State(usecase): State<Arc<SubscriptionUseCase<U, M, G>>>,
    _auth: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let plans = usecase.list_plans().await?;
    Ok(Json(json!({ "success": true, "data": plans })))
}

pub async fn create_payment_intent<U, M, G>(
    State(usecase): State<Arc<SubscriptionUseCase<U, M, G>>>,
    auth: AuthUser,
    Json(model): Json<CreateCheckoutModel>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let checkout = usecase.create_checkout(&auth, model).await?;
    Ok(Json(checkout))
}

pub async fn create_subscription<U, M, G>(
    State(usecase): State<Arc<SubscriptionUseCase<U, M, G>>>,
    auth: AuthUser,
    Json(model): Json<CreateSubscriptionModel>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let created = usecase.create_subscription(&auth, model).await?;
    Ok(Json(created))
}

pub async fn upgrade<U, M, G>(
    State(usecase): State<Arc<SubscriptionUseCase<U, M, G>>>,
    auth: AuthUser,
    Json(model): Json<UpgradeModel>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let outcome = usecase.upgrade(&auth, model).await?;
    Ok(Json(json!({ "success": true, "data": outcome })))
}

pub async fn status<U, M, G>(
    State(usecase): State<Arc<SubscriptionUseCase<U, M, G>>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let summary = usecase.status(auth.user_id).await?;
    Ok(Json(json!({ "success": true, "subscription": summary })))
}

pub async fn cancel<U, M, G>(
    State(usecase): State<Arc<SubscriptionUseCase<U, M, G>>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    usecase.cancel(auth.user_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn reactivate<U, M, G>(
    State(usecase): State<Arc<SubscriptionUseCase<U, M, G>>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    usecase.reactivate(auth.user_id).await?;
    Ok(Json(json!({ "success": true })))
}
