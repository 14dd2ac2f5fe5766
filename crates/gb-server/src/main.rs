//! gb-server: Main binary for the multi-tenant gift sniper service.
//!
//! This binary wires together all crates, starts monitoring for every active
//! user, serves the control API and stops all sessions on shutdown.

use gb_api::{create_router, AppState};
use gb_detector::JsonHistoryStore;
use gb_ingestion::{GatewayConfig, GatewayFactory};
use gb_orchestrator::{JsonConfigStore, Orchestrator};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default port for the server.
const DEFAULT_PORT: u16 = 3000;

/// Default host for the server.
const DEFAULT_HOST: &str = "0.0.0.0";

/// Default location of the user configuration file.
const DEFAULT_USERS_FILE: &str = "data/users.json";

/// Default directory for per-user history snapshots.
const DEFAULT_HISTORY_DIR: &str = "data/history";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "gb_server=info,gb_api=info,gb_orchestrator=info,gb_detector=info,gb_ingestion=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse configuration from environment. A missing gateway is fatal.
    let gateway = GatewayConfig::from_env()?;
    let users_file =
        std::env::var("GB_USERS_FILE").unwrap_or_else(|_| DEFAULT_USERS_FILE.to_string());
    let history_dir =
        std::env::var("GB_HISTORY_DIR").unwrap_or_else(|_| DEFAULT_HISTORY_DIR.to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    tracing::info!(
        "Starting gb-server on {}:{} (gateway: {}, users: {}, history: {})",
        host,
        port,
        gateway.base_url,
        users_file,
        history_dir
    );

    // Wire the orchestrator
    let factory = GatewayFactory::new(gateway)?;
    let store = Arc::new(JsonConfigStore::new(users_file));
    let history = Arc::new(JsonHistoryStore::new(history_dir));
    let orchestrator = Orchestrator::new(factory, store, history);

    let started = orchestrator.start_all_active().await?;
    tracing::info!("Monitoring {} user(s)", started);

    // Create app state and router
    let state = Arc::new(AppState::new(orchestrator));
    let app = create_router(state.clone());

    // Start server
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                      - Health check");
    tracing::info!("  GET  /v1/sessions                 - List running sessions");
    tracing::info!("  GET  /v1/sessions/:id             - One session");
    tracing::info!("  POST /v1/sessions/:id/start       - Start monitoring");
    tracing::info!("  POST /v1/sessions/:id/stop        - Stop monitoring");
    tracing::info!("  POST /v1/sessions/:id/restart     - Restart monitoring");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.orchestrator.stop_all().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
