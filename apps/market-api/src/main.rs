//! # Market API Server
//!
//! HTTP server for the marketplace plus the notification dispatcher.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Market API Server                                │
//! │                                                                         │
//! │  Clients ───► HTTP (8000) ───► Routes ───► SQLite                       │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                                        Outbox Dispatcher                │
//! │                                        (Redis Pub/Sub or log)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::Path;

use market_api::notifier::{Dispatcher, DispatcherHandle, LogSink, RedisSink};
use market_api::{router, AppState, MarketConfig};
use market_db::{Database, DbConfig};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "market_api=info,market_db=info,tower_http=info".into()),
        )
        .with_target(true)
        .init();

    info!("Starting Market API server...");

    // Load configuration
    let config = MarketConfig::load()?;
    info!(
        port = config.http_port,
        database = %config.database_path,
        redis = config.redis_url.is_some(),
        "Configuration loaded"
    );

    // Open database (runs migrations)
    if let Some(parent) = Path::new(&config.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Database::new(
        DbConfig::new(&config.database_path).max_connections(config.db_max_connections),
    )
    .await?;
    info!("Database ready");

    // Start the notification dispatcher
    let (dispatcher, dispatcher_task) = spawn_dispatcher(&db, &config).await;

    // Build and start the HTTP server
    let state = AppState::new(db.clone(), config.clone())?;
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher.shutdown().await;
    if let Err(e) = dispatcher_task.await {
        error!(?e, "Dispatcher task failed");
    }
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Spawns the outbox dispatcher with Redis when available, else the log sink.
async fn spawn_dispatcher(db: &Database, config: &MarketConfig) -> (DispatcherHandle, JoinHandle<()>) {
    let interval = config.poll_interval();
    let batch = config.notify_batch_size;

    if let Some(ref redis_url) = config.redis_url {
        let sink = match redis::Client::open(redis_url.as_str()) {
            Ok(client) => RedisSink::connect(&client, config.notify_channel.as_str()).await,
            Err(e) => Err(e),
        };
        match sink {
            Ok(sink) => {
                info!(channel = %config.notify_channel, "Connected to Redis");
                let (dispatcher, handle) = Dispatcher::new(db.clone(), sink, interval, batch);
                return (handle, tokio::spawn(dispatcher.run()));
            }
            Err(e) => {
                warn!(?e, "Failed to connect to Redis, notifications will be logged");
            }
        }
    }

    let (dispatcher, handle) = Dispatcher::new(db.clone(), LogSink, interval, batch);
    (handle, tokio::spawn(dispatcher.run()))
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(?e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(?e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
