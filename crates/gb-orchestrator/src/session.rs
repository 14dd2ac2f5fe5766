//! A running user session.

use chrono::{DateTime, Utc};
use gb_detector::{LoopPhase, LoopStatus};
use gb_ingestion::Transport;
use gb_types::{UserConfig, UserId};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Read-only view of one session, as reported by the control surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub user_id: UserId,
    pub phase: LoopPhase,
    pub cycles: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// One user's bound configuration, transport handle and detection task.
///
/// Owned by the orchestrator registry. Dropping a session without calling
/// [`shutdown`](Self::shutdown) leaves the task running.
pub struct UserSession<T> {
    config: Arc<UserConfig>,
    transport: Arc<T>,
    cancel: CancellationToken,
    task: JoinHandle<LoopPhase>,
    status: watch::Receiver<LoopStatus>,
    started_at: DateTime<Utc>,
}

impl<T: Transport> UserSession<T> {
    pub(crate) fn new(
        config: Arc<UserConfig>,
        transport: Arc<T>,
        cancel: CancellationToken,
        task: JoinHandle<LoopPhase>,
        status: watch::Receiver<LoopStatus>,
    ) -> Self {
        Self {
            config,
            transport,
            cancel,
            task,
            status,
            started_at: Utc::now(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.config.user_id
    }

    pub fn config(&self) -> &UserConfig {
        &self.config
    }

    /// Latest status published by the detection loop.
    pub fn status(&self) -> LoopStatus {
        self.status.borrow().clone()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns true once the detection task has exited (cancelled or failed).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn summary(&self) -> SessionSummary {
        let status = self.status();
        SessionSummary {
            user_id: self.user_id(),
            phase: status.phase,
            cycles: status.cycles,
            last_error: status.last_error,
            started_at: self.started_at,
        }
    }

    /// Cancel the loop, wait for it to exit, then release the transport.
    ///
    /// Never fails: task and transport errors are logged.
    pub(crate) async fn shutdown(self) {
        let user_id = self.user_id();
        self.cancel.cancel();

        match self.task.await {
            Ok(phase) => tracing::debug!(user_id, ?phase, "Detection task exited"),
            Err(e) => tracing::error!(user_id, "Detection task ended abnormally: {}", e),
        }

        if let Err(e) = self.transport.disconnect().await {
            tracing::warn!(user_id, "Transport disconnect failed: {}", e);
        }
    }
}
