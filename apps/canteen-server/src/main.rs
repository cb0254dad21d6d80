//! # Canteen Server
//!
//! HTTP entry point for the canteen raffle ticket engine.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Terminal / browser ───► HTTP (3000) ───► Services ───► SQLite          │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                                  Redis (login attempts, optional)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use canteen_db::{Database, DbConfig};
use canteen_server::config::ServerConfig;
use canteen_server::notifier::ConsoleNotifier;
use canteen_server::rate_limit::{
    InMemoryLoginAttemptStore, LoginAttemptStore, LoginLimits, RedisLoginAttemptStore,
};
use canteen_server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,canteen=debug,sqlx=warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    info!("Starting canteen server...");

    // Load configuration
    let config = ServerConfig::load()?;
    info!(
        port = config.http_port,
        db_path = %config.db_path,
        redis = config.redis_url.is_some(),
        "Configuration loaded"
    );

    // Open database (migrations run on connect)
    let db = Database::new(
        DbConfig::new(&config.db_path).max_connections(config.db_max_connections),
    )
    .await?;
    info!("Database ready");

    db.ticket_configs().ensure_default(chrono::Utc::now()).await?;

    let login_attempts = login_attempt_store(&config).await;
    let state = AppState::new(db.clone(), &config, Arc::new(ConsoleNotifier), login_attempts);

    if let Some((username, password)) = config.bootstrap_admin() {
        match state.users.bootstrap_admin(username, password).await {
            Ok(true) => info!(username = %username, "Admin account bootstrapped"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Admin bootstrap skipped"),
        }
    }

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Redis when configured and reachable, otherwise per-process memory.
async fn login_attempt_store(config: &ServerConfig) -> Arc<dyn LoginAttemptStore> {
    let limits = LoginLimits {
        max_attempts: config.login_max_attempts,
        lockout: config.login_lockout(),
    };

    if let Some(redis_url) = &config.redis_url {
        match RedisLoginAttemptStore::new(redis_url, limits).await {
            Ok(store) => {
                info!("Login attempts tracked in Redis");
                return Arc::new(store);
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to Redis, tracking login attempts in memory");
            }
        }
    }

    Arc::new(InMemoryLoginAttemptStore::new(limits))
}

/// Graceful shutdown signal handler.
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
