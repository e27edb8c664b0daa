//! Fieldguide Server - Main Entry Point

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use wiki_server::{
    api, config, db,
    db::{FeedbackStore, MemoryDb, PgStore, UserStore},
    ratelimit::{RateLimitConfig, RateLimiter},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wiki_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = config.environment.as_str(),
        "Starting Fieldguide Server"
    );

    // Initialize storage
    let (users, feedback): (Arc<dyn UserStore>, Arc<dyn FeedbackStore>) =
        if let Some(url) = &config.database_url {
            let pool = db::create_pool(url).await?;
            db::run_migrations(&pool).await?;
            let store = Arc::new(PgStore::new(pool));
            (store.clone(), store)
        } else {
            warn!("DATABASE_URL not set, using in-memory storage");
            let store = Arc::new(MemoryDb::new());
            (store.clone(), store)
        };

    // Initialize rate limiter
    let rl_config = RateLimitConfig::from_env();
    if !rl_config.enabled {
        info!("Rate limiting disabled by configuration");
    }
    let rate_limiter = RateLimiter::from_config(&config, rl_config).await;

    // Build application state and router
    let state = api::AppState::new(api::AppStateConfig {
        config: config.clone(),
        rate_limiter,
        users,
        feedback,
        sessions: None,
    });
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");

    Ok(())
}
