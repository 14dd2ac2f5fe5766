//! gb-api: HTTP control API for the gift sniper.
//!
//! This crate defines the REST endpoints over the orchestrator:
//! - GET  /health
//! - GET  /v1/sessions
//! - GET  /v1/sessions/:user_id
//! - POST /v1/sessions/:user_id/start
//! - POST /v1/sessions/:user_id/stop
//! - POST /v1/sessions/:user_id/restart
//!
//! Start and restart also set the user's active flag in the configuration
//! store, stop clears it, so the next boot resumes the same set of users.

pub mod error;
pub mod handlers;
pub mod state;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};
use gb_detector::HistoryStore;
use gb_ingestion::TransportFactory;
use gb_orchestrator::ConfigStore;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use error::ApiError;
pub use state::AppState;

/// Build the router with every endpoint mounted.
pub fn create_router<F, S, H>(state: Arc<AppState<F, S, H>>) -> Router
where
    F: TransportFactory,
    S: ConfigStore,
    H: HistoryStore,
{
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/sessions", get(handlers::list_sessions::<F, S, H>))
        .route("/v1/sessions/:user_id", get(handlers::get_session::<F, S, H>))
        .route(
            "/v1/sessions/:user_id/start",
            post(handlers::start_session::<F, S, H>),
        )
        .route(
            "/v1/sessions/:user_id/stop",
            post(handlers::stop_session::<F, S, H>),
        )
        .route(
            "/v1/sessions/:user_id/restart",
            post(handlers::restart_session::<F, S, H>),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
