//! speaksmart-api - Speech analysis backend service

use anyhow::Result;
use tracing::info;

use speaksmart_api::config::AppConfig;
use speaksmart_api::identity::IdentityClient;
use speaksmart_api::{build_router, db, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting SpeakSmart API v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let pool = db::init_database(&config.database_path).await?;
    info!("Database connection established");

    let identity = IdentityClient::new(config.identity_url.as_str(), &config.identity_api_key);
    info!("Identity service: {}", config.identity_url);

    let addr = format!("127.0.0.1:{}", config.port);
    let state = AppState::new(pool, identity, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}");
    info!("Health check: http://{addr}/health");

    axum::serve(listener, app).await?;

    Ok(())
}
