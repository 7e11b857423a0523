//! Resman Server - main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use resman_core::{
    api::{self, AppState},
    config::Config,
    notify::{LiveFeed, RedisStreamPublisher},
    pipeline::MutationPipeline,
    store::PgStore,
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    telemetry::init_tracing(&config.observability);
    let metrics = telemetry::init_metrics()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Resman Server"
    );

    // Connect to storage and apply migrations.
    let store = PgStore::new(&config.database.url, config.database.max_connections).await?;
    store.migrate().await?;
    tracing::info!("Connected to database, migrations applied");

    // Open the downstream channel handles once, for the process lifetime.
    let publisher =
        RedisStreamPublisher::connect(&config.redis.url, config.redis.event_stream.clone())
            .await?;
    tracing::info!(stream = %publisher.stream(), "Durable event publisher ready");

    let live_feed = Arc::new(LiveFeed::new(config.live_feed.capacity));

    let pipeline = MutationPipeline::new(
        Arc::new(store),
        live_feed,
        Arc::new(publisher),
    );

    let app_state = AppState {
        pipeline,
        jwt_secret: Arc::new(config.auth.jwt_secret),
        metrics: Some(metrics),
    };

    let app = api::build_router(app_state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
