mod audit;
mod config;
mod engine;
mod error;
mod extract;
mod prompt;
mod rate_limit;
mod relay_engine;
mod server;
mod types;

use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use audit::AuditLog;
use config::{Config, RateLimitConfig};
use rate_limit::RateLimiter;
use relay_engine::RelayEngine;
use server::AppState;

const PRUNE_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment and flags still apply.
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dewey=debug".into()),
        )
        .init();

    let config = Config::parse();
    tracing::info!("Starting DDC classification relay with config: {:?}", config);

    if config.request_timeout_secs == 0 {
        anyhow::bail!("--request-timeout-secs must be greater than zero");
    }

    let audit = Arc::new(AuditLog::new(
        config.classification_log.clone(),
        config.error_log.clone(),
    ));
    audit.ensure_files().await;

    let endpoint = config.endpoint();
    tracing::info!(url = %endpoint.url, model = %endpoint.model, "Using completion endpoint");
    let engine = RelayEngine::new(endpoint, config.request_timeout(), audit)?;

    let rate_limits = RateLimitConfig::from(&config);
    let limiter = Arc::new(RateLimiter::new(rate_limits));

    // Spawn background task to forget idle clients
    let pruned = Arc::clone(&limiter);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            pruned.prune();
            tracing::trace!(clients = pruned.tracked_clients(), "Pruned rate limit table");
        }
    });

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = server::router(AppState::new(Arc::new(engine)), limiter)
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(prometheus_layer);

    let listener = TcpListener::bind(&config.server_address()).await?;
    tracing::info!("Server running on http://{}", config.server_address());
    tracing::info!(
        "Rate limits per client: {}/minute, {}/hour, {}/day",
        rate_limits.per_minute,
        rate_limits.per_hour,
        rate_limits.per_day
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
