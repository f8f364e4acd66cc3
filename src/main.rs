//! TripDesk - Travel agency booking back office

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tripdesk::{
    api::{self, AppState},
    cache::create_cache,
    config::Config,
    db,
    services::{PaymentGateway, StripeClient},
};

/// Interval of the session and rate limiter cleanup task
const CLEANUP_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripdesk=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting TripDesk...");

    let config = Config::load_with_env(Path::new("config.yml"))?;
    config.validate()?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let cache = create_cache(&config.cache);

    let gateway: Option<Arc<dyn PaymentGateway>> = match config.payments.secret_key.as_deref() {
        Some(key) if config.payments.enabled && !key.is_empty() => {
            Some(Arc::new(StripeClient::new(&config.payments.api_base, key)?))
        }
        _ => {
            tracing::warn!("Payments disabled, checkout will answer 503");
            None
        }
    };
    if config.chat.webhook_url.is_none() {
        tracing::warn!("No chat webhook configured, the widget will answer with the fallback message");
    }

    let state = AppState::build(pool, cache, &config, gateway)?;

    // Expired sessions and stale rate limiter windows
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                match state.user_service.cleanup_expired_sessions().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "Expired sessions removed"),
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                }
                state.rate_limiter.cleanup().await;
                state.inquiry_limiter.cleanup().await;
                state.chat_relay.cleanup_rate_limits().await;
            }
        });
    }

    let app = api::build_router(state, &config);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
