use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use crates::{
    domain::repositories::{stripe_meta::StripeMetaRepository, users::UserRepository},
    infra::db::postgres::postgres_connection::PgPoolSquad,
    payments::stripe_client::StripeClient,
};
use serde_json::json;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::ApiError,
    config::config_model::DotEnvyConfig,
    usecases::{stripe_gateway::StripeGateway, subscriptions::SubscriptionUseCase},
};

use super::subscriptions;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    config: Arc<DotEnvyConfig>,
) -> Router {
    router(Arc::new(subscriptions::usecase(db_pool, stripe_client, &config)))
}

pub fn router<U, M, G>(usecase: Arc<SubscriptionUseCase<U, M, G>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/create-portal-session", post(create_portal_session))
        .with_state(usecase)
}

pub async fn create_portal_session<U, M, G>(
    State(usecase): State<Arc<SubscriptionUseCase<U, M, G>>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    M: StripeMetaRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let url = usecase.create_portal_session(&auth).await?;
    Ok(Json(json!({ "url": url })))
}
