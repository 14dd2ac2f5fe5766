//! Route handlers for the API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use gb_detector::HistoryStore;
use gb_ingestion::TransportFactory;
use gb_orchestrator::{ConfigStore, SessionSummary, StartStatus};
use gb_types::UserId;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{HealthResponse, LifecycleResponse, LifecycleStatus, SessionsResponse};

type SharedState<F, S, H> = State<Arc<AppState<F, S, H>>>;

/// Persist the active flag after a lifecycle call has settled.
///
/// The response reports what the registry did, so a store failure here is
/// logged and not turned into an error.
async fn remember_active<F, S, H>(state: &AppState<F, S, H>, user_id: UserId, active: bool)
where
    F: TransportFactory,
    S: ConfigStore,
    H: HistoryStore,
{
    if let Err(e) = state.orchestrator.store().set_active(user_id, active).await {
        tracing::error!(user_id, active, "Failed to persist active flag: {}", e);
    }
}

impl From<StartStatus> for LifecycleStatus {
    fn from(status: StartStatus) -> Self {
        match status {
            StartStatus::Started => LifecycleStatus::Started,
            StartStatus::AlreadyActive => LifecycleStatus::AlreadyActive,
        }
    }
}

/// GET /health - Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /v1/sessions - List running sessions.
pub async fn list_sessions<F, S, H>(State(state): SharedState<F, S, H>) -> Json<SessionsResponse>
where
    F: TransportFactory,
    S: ConfigStore,
    H: HistoryStore,
{
    let orchestrator = &state.orchestrator;
    Json(SessionsResponse {
        active_count: orchestrator.active_count().await,
        sessions: orchestrator.sessions().await,
    })
}

/// GET /v1/sessions/:user_id - One running session.
pub async fn get_session<F, S, H>(
    State(state): SharedState<F, S, H>,
    Path(user_id): Path<UserId>,
) -> Result<Json<SessionSummary>, ApiError>
where
    F: TransportFactory,
    S: ConfigStore,
    H: HistoryStore,
{
    state
        .orchestrator
        .session(user_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no running session for user {}", user_id)))
}

/// POST /v1/sessions/:user_id/start - Start monitoring and mark the user active.
pub async fn start_session<F, S, H>(
    State(state): SharedState<F, S, H>,
    Path(user_id): Path<UserId>,
) -> Result<Json<LifecycleResponse>, ApiError>
where
    F: TransportFactory,
    S: ConfigStore,
    H: HistoryStore,
{
    let status = state.orchestrator.start(user_id).await?;
    remember_active(&state, user_id, true).await;

    Ok(Json(LifecycleResponse {
        user_id,
        status: status.into(),
    }))
}

/// POST /v1/sessions/:user_id/stop - Stop monitoring and mark the user inactive.
pub async fn stop_session<F, S, H>(
    State(state): SharedState<F, S, H>,
    Path(user_id): Path<UserId>,
) -> Json<LifecycleResponse>
where
    F: TransportFactory,
    S: ConfigStore,
    H: HistoryStore,
{
    let stopped = state.orchestrator.stop(user_id).await;
    remember_active(&state, user_id, false).await;

    Json(LifecycleResponse {
        user_id,
        status: if stopped {
            LifecycleStatus::Stopped
        } else {
            LifecycleStatus::NotRunning
        },
    })
}

/// POST /v1/sessions/:user_id/restart - Restart with the running configuration.
pub async fn restart_session<F, S, H>(
    State(state): SharedState<F, S, H>,
    Path(user_id): Path<UserId>,
) -> Result<Json<LifecycleResponse>, ApiError>
where
    F: TransportFactory,
    S: ConfigStore,
    H: HistoryStore,
{
    let status = state.orchestrator.restart(user_id).await?;
    remember_active(&state, user_id, true).await;

    Ok(Json(LifecycleResponse {
        user_id,
        status: status.into(),
    }))
}
