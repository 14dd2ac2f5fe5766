//! API request and response types.

use gb_orchestrator::SessionSummary;
use gb_types::UserId;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Response for the session listing.
#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    /// Users that are starting or running.
    pub active_count: usize,
    /// Running sessions, in user id order.
    pub sessions: Vec<SessionSummary>,
}

/// What a lifecycle call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Started,
    AlreadyActive,
    Stopped,
    NotRunning,
}

/// Response for start, stop and restart.
#[derive(Debug, Serialize)]
pub struct LifecycleResponse {
    pub user_id: UserId,
    pub status: LifecycleStatus,
}
