use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;

use envmon_api::config::ServerConfig;
use envmon_api::router::build_app_router;
use envmon_api::state::AppState;
use envmon_core::error::ConfigError;
use envmon_core::telemetry::{init_tracing, shutdown_signal};
use envmon_db::PgReadingStore;

/// Fatal startup errors.
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing("envmon_api=debug,tower_http=debug");

    match run().await {
        Ok(()) => {
            tracing::info!("Graceful shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "API server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    let host: IpAddr = config.host.parse().map_err(|e: std::net::AddrParseError| {
        ConfigError::Invalid {
            key: "HOST",
            value: config.host.clone(),
            reason: e.to_string(),
        }
    })?;
    tracing::info!(host = %config.host, port = config.port, static_dir = %config.static_dir.display(), "Loaded server configuration");

    // --- Database ---
    let pool = envmon_db::create_pool(&config.database_url).await?;
    envmon_db::health_check(&pool).await?;
    envmon_db::run_migrations(&pool).await?;
    tracing::info!("Database ready, migrations applied");

    // --- App state + router ---
    let state = AppState {
        store: Arc::new(PgReadingStore::new(pool.clone())),
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped accepting connections, closing database pool");
    pool.close().await;
    Ok(())
}
