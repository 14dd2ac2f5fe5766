//! API error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gb_orchestrator::OrchestratorError;
use serde::Serialize;
use thiserror::Error;

/// API errors that can be returned to clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Error from a lifecycle operation.
    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            ApiError::Orchestrator(e) => match e {
                OrchestratorError::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "not_found", Some(e.to_string()))
                }
                OrchestratorError::Config(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_config", Some(e.to_string()))
                }
                OrchestratorError::Transport(_) => {
                    tracing::warn!("Transport error: {}", e);
                    (StatusCode::BAD_GATEWAY, "transport_error", Some(e.to_string()))
                }
                OrchestratorError::Stopping(_) | OrchestratorError::Interrupted(_) => {
                    (StatusCode::CONFLICT, "conflict", Some(e.to_string()))
                }
                OrchestratorError::Launch { .. } => {
                    tracing::error!("Launch error: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
                }
                OrchestratorError::Store(_) => {
                    tracing::error!("Store error: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "store_error", None)
                }
            },
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
