use anyhow::Result;
use backend::axum_http::http_serve;
use backend::config::config_loader;
use crates::infra::db::postgres::postgres_connection;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!(error = ?error, "billing backend exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("backend")?;

    let config = config_loader::load()?;
    info!(
        stage = ?config.stage,
        port = config.backend_server.port,
        google_login = config.social.google.is_some(),
        github_login = config.social.github.is_some(),
        uploads_dir = %config.uploads.dir,
        "billing backend: configuration loaded"
    );

    let db_pool = postgres_connection::establish_connection(&config.database.url)?;
    info!(
        max_connections = db_pool.max_size(),
        "billing backend: postgres pool ready for auth and stripe meta"
    );

    http_serve::start(Arc::new(config), Arc::new(db_pool)).await?;

    Ok(())
}
