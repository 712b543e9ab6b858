use crate::{
    axum_http::{
        default_routers,
        middleware::{route_guard::route_guard, session::resolve_session},
        routers::{self, PgSessionService},
    },
    config::config_model::{DotEnvyConfig, OAuthApp},
    usecases::sessions::{SessionService, SessionSettings},
};
use anyhow::{Context, Result};
use axum::{
    Router,
    http::{
        HeaderName, HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::get,
};
use crates::{
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{sessions::SessionPostgres, users::UserPostgres},
        },
        mailer::resend::{ResendConfig, ResendMailer},
        oauth::social_client::{OAuthCredentials, SocialOAuthClient, SocialOAuthConfig},
        storages::local_fs::{LocalFsStorage, PUBLIC_UPLOADS_PREFIX},
    },
    payments::stripe_client::StripeClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, services::ServeDir, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

fn oauth_credentials(app: &Option<OAuthApp>) -> Option<OAuthCredentials> {
    app.as_ref().map(|app| OAuthCredentials {
        client_id: app.client_id.clone(),
        client_secret: app.client_secret.clone(),
    })
}

/// The app origin plus any configured trusted origins; credentials are allowed
/// for exactly these.
fn allowed_origins(config: &DotEnvyConfig) -> Result<Vec<HeaderValue>> {
    let mut origins = vec![config.stripe.app_url.clone()];
    for origin in &config.auth.trusted_origins {
        if !origins.contains(origin) {
            origins.push(origin.clone());
        }
    }

    origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid trusted origin {origin}"))
        })
        .collect()
}

pub fn app(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<Router> {
    let sessions: Arc<PgSessionService> = Arc::new(SessionService::new(
        Arc::new(SessionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(UserPostgres::new(Arc::clone(&db_pool))),
        SessionSettings::from_secs(
            config.auth.session_expires_in_secs,
            config.auth.session_update_age_secs,
        ),
    ));
    let stripe_client = Arc::new(StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
    ));
    let mailer = Arc::new(ResendMailer::new(ResendConfig {
        api_key: config.email.resend_api_key.clone(),
        from_email: config.email.from_email.clone(),
    })?);
    let identity_provider = Arc::new(SocialOAuthClient::new(SocialOAuthConfig {
        google: oauth_credentials(&config.social.google),
        github: oauth_credentials(&config.social.github),
    })?);
    let storage = Arc::new(LocalFsStorage::new(&config.uploads.dir));

    let auth_routes = routers::auth::routes(
        Arc::clone(&db_pool),
        Arc::clone(&sessions),
        Arc::clone(&config),
    )
    .merge(routers::social_login::routes(
        Arc::clone(&db_pool),
        Arc::clone(&sessions),
        identity_provider,
        Arc::clone(&config),
    ))
    .merge(routers::two_factor::routes(
        Arc::clone(&db_pool),
        Arc::clone(&sessions),
        Arc::clone(&config),
    ))
    .merge(routers::email_otp::routes(
        Arc::clone(&db_pool),
        Arc::clone(&sessions),
        Arc::clone(&mailer),
    ));

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/auth", auth_routes)
        .nest(
            "/api/subscription",
            routers::subscriptions::routes(
                Arc::clone(&db_pool),
                Arc::clone(&stripe_client),
                Arc::clone(&config),
            ),
        )
        .nest(
            "/api/stripe",
            routers::billing_portal::routes(
                Arc::clone(&db_pool),
                Arc::clone(&stripe_client),
                Arc::clone(&config),
            ),
        )
        .nest(
            "/api/webhooks",
            routers::stripe_webhook::routes(Arc::clone(&db_pool), stripe_client),
        )
        .nest("/api/send-email", routers::emails::routes(mailer))
        .nest(
            "/api/upload-profile-image",
            routers::profile_image::routes(storage),
        )
        .nest_service(PUBLIC_UPLOADS_PREFIX, ServeDir::new(&config.uploads.dir))
        .route("/api/health-check", get(default_routers::health_check))
        .layer(middleware::from_fn(route_guard))
        .layer(middleware::from_fn_with_state(
            sessions,
            resolve_session::<SessionPostgres, UserPostgres>,
        ))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::PUT,
                    Method::DELETE,
                ])
                .allow_headers([
                    AUTHORIZATION,
                    CONTENT_TYPE,
                    HeaderName::from_static("stripe-signature"),
                ])
                .allow_credentials(true)
                .allow_origin(allowed_origins(&config)?),
        )
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let app = app(Arc::clone(&config), db_pool)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Server is running on port {}", config.backend_server.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
