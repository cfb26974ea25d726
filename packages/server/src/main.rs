use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use common::storage::{self, UrlSigner};
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::config::AppConfig;
use server::mail::LogMailer;
use server::rate_limit::{self, RateLimiter};
use server::state::AppState;
use server::utils::jwt::JwtKeys;
use server::{build_router, database, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let db = database::init_db(&config.database.url)
        .await
        .context("failed to connect to database")?;
    seed::ensure_indexes(&db).await?;
    seed::bootstrap_admin(&db, &config.auth).await?;

    let storage = storage::from_config(
        &config.storage,
        config.url_signing_secret(),
        &config.media_files_url(),
    )
    .await
    .context("failed to initialise object storage")?;
    match &storage {
        Some(store) => info!(backend = store.backend(), "Object storage ready"),
        None => info!("Object storage disabled; media endpoints will answer 503"),
    }

    let rate_limiter = Arc::new(RateLimiter::new());
    rate_limit::spawn_cleanup_task(
        rate_limiter.clone(),
        config.rate_limit.window(),
        Duration::from_secs(config.rate_limit.cleanup_interval_secs.max(1)),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host/server.port")?;

    let state = AppState {
        db,
        jwt: JwtKeys::new(&config.auth.jwt_secret),
        file_signer: UrlSigner::new(config.url_signing_secret()),
        storage,
        mailer: Arc::new(LogMailer),
        rate_limiter,
        config,
    };

    let app = build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
