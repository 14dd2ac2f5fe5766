//! The multi-tenant orchestrator.
//!
//! Owns the only shared mutable structure in the engine: the registry of
//! user sessions. Per-user lifecycle:
//!
//! ```text
//! STOPPED ─► STARTING ─► RUNNING ─► STOPPING ─► STOPPED
//!                           │
//!                           └─► (restart) STOPPING ─► delay ─► STARTING
//! ```
//!
//! The registry lock is never held across transport I/O. A start first
//! reserves the user's slot, does its slow work unlocked, then installs the
//! session; a stop that arrives in between cancels the reservation and the
//! starter tears down what it built.
//!
//! Once a slot has been reserved or marked stopping, the rest of the
//! transition runs in its own task. Dropping the caller's future (an HTTP
//! client hanging up, a timeout) never strands a slot.

use futures::FutureExt;
use gb_detector::{
    panic_message, DetectionLoop, HistoryStore, NotificationSink, RangeAcquisition,
    TransportNotifier,
};
use gb_ingestion::{Transport, TransportFactory};
use gb_types::{UserConfig, UserId};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::OrchestratorError;
use crate::session::{SessionSummary, UserSession};
use crate::store::ConfigStore;

/// Pause between the stop and start halves of a restart.
pub const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Result of a successful `start` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStatus {
    /// A new session was launched.
    Started,
    /// The user was already starting or running; nothing changed.
    AlreadyActive,
}

enum Slot<T> {
    /// Reserved by an in-flight start. Cancelling the token aborts it.
    Starting(CancellationToken),
    Running(UserSession<T>),
    Stopping,
}

type Registry<T> = Arc<Mutex<BTreeMap<UserId, Slot<T>>>>;

/// Drop a reservation that is still ours.
async fn release<T>(registry: &Registry<T>, user_id: UserId, token: &CancellationToken) {
    if !token.is_cancelled() {
        registry.lock().await.remove(&user_id);
    }
}

/// What a detached start task needs from the orchestrator.
struct Launcher<F: TransportFactory, H> {
    factory: Arc<F>,
    history: Arc<H>,
    notifier: Arc<TransportNotifier>,
    registry: Registry<F::Transport>,
}

impl<F, H> Launcher<F, H>
where
    F: TransportFactory,
    H: HistoryStore,
{
    /// Build and install the session for a reserved slot.
    ///
    /// Every exit leaves the slot either `Running` or gone, panics included.
    async fn run(
        self,
        config: UserConfig,
        token: CancellationToken,
    ) -> Result<StartStatus, OrchestratorError> {
        let user_id = config.user_id;
        match AssertUnwindSafe(self.install(config, token.clone()))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                release(&self.registry, user_id, &token).await;
                let message = panic_message(panic.as_ref());
                tracing::error!(user_id, "Start panicked: {}", message);
                Err(OrchestratorError::Launch { user_id, message })
            }
        }
    }

    async fn install(
        &self,
        config: UserConfig,
        token: CancellationToken,
    ) -> Result<StartStatus, OrchestratorError> {
        let user_id = config.user_id;

        let session = match self.launch(config, token.clone()).await {
            Ok(session) => session,
            Err(e) => {
                release(&self.registry, user_id, &token).await;
                tracing::error!(user_id, "Failed to start monitoring: {}", e);
                return Err(e);
            }
        };

        let mut registry = self.registry.lock().await;
        if token.is_cancelled() {
            // A stop removed the reservation while we were launching.
            drop(registry);
            session.shutdown().await;
            tracing::info!(user_id, "Start interrupted by stop");
            return Err(OrchestratorError::Interrupted(user_id));
        }
        registry.insert(user_id, Slot::Running(session));
        tracing::info!(user_id, "Monitoring started");
        Ok(StartStatus::Started)
    }

    async fn launch(
        &self,
        config: UserConfig,
        cancel: CancellationToken,
    ) -> Result<UserSession<F::Transport>, OrchestratorError> {
        let user_id = config.user_id;
        config.credentials.validate(user_id)?;

        let transport = Arc::new(self.factory.open(&config)?);
        if let Err(e) = transport.connect().await {
            if let Err(close) = transport.disconnect().await {
                tracing::debug!(user_id, "Cleanup disconnect failed: {}", close);
            }
            return Err(e.into());
        }

        let config = Arc::new(config);
        if let Err(e) = self.notifier.send_start(transport.as_ref(), &config).await {
            tracing::warn!(user_id, "Failed to send start notification: {}", e);
        }

        let detector = DetectionLoop::new(
            config.clone(),
            transport.clone(),
            self.history.clone(),
            self.notifier.clone(),
            Arc::new(RangeAcquisition),
        );
        let status = detector.subscribe();
        let task = tokio::spawn(detector.run(cancel.clone()));

        Ok(UserSession::new(config, transport, cancel, task, status))
    }
}

/// Starts, stops and tracks one detection loop per user.
pub struct Orchestrator<F: TransportFactory, S, H> {
    factory: Arc<F>,
    store: Arc<S>,
    history: Arc<H>,
    notifier: Arc<TransportNotifier>,
    registry: Registry<F::Transport>,
    restart_delay: Duration,
}

impl<F, S, H> Orchestrator<F, S, H>
where
    F: TransportFactory,
    S: ConfigStore,
    H: HistoryStore,
{
    pub fn new(factory: F, store: Arc<S>, history: Arc<H>) -> Self {
        Self {
            factory: Arc::new(factory),
            store,
            history,
            notifier: Arc::new(TransportNotifier),
            registry: Arc::new(Mutex::new(BTreeMap::new())),
            restart_delay: RESTART_DELAY,
        }
    }

    /// Override the restart pause (tests).
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// The configuration store sessions are loaded from.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start monitoring for `user_id` using its stored configuration.
    pub async fn start(&self, user_id: UserId) -> Result<StartStatus, OrchestratorError> {
        let config = self
            .store
            .user_config(user_id)
            .await?
            .ok_or(OrchestratorError::NotFound(user_id))?;
        self.start_with(config).await
    }

    /// Start monitoring with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Incomplete credentials and transport open/connect failures are
    /// returned after cleanup; the registry keeps no entry for the user.
    /// A start whose caller goes away still runs to completion.
    pub async fn start_with(&self, config: UserConfig) -> Result<StartStatus, OrchestratorError> {
        let user_id = config.user_id;

        let token = {
            let mut registry = self.registry.lock().await;
            match registry.get(&user_id) {
                Some(Slot::Starting(_)) | Some(Slot::Running(_)) => {
                    tracing::warn!(user_id, "Monitoring already active, ignoring start");
                    return Ok(StartStatus::AlreadyActive);
                }
                Some(Slot::Stopping) => return Err(OrchestratorError::Stopping(user_id)),
                None => {
                    let token = CancellationToken::new();
                    registry.insert(user_id, Slot::Starting(token.clone()));
                    token
                }
            }
        };

        let launcher = Launcher {
            factory: self.factory.clone(),
            history: self.history.clone(),
            notifier: self.notifier.clone(),
            registry: self.registry.clone(),
        };
        match tokio::spawn(launcher.run(config, token)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(user_id, "Start task ended abnormally: {}", e);
                Err(OrchestratorError::Launch {
                    user_id,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Stop monitoring for `user_id`.
    ///
    /// Idempotent: returns false if nothing was running or a stop is already
    /// in progress. The registry entry is removed as the last step whatever
    /// happens during teardown, even if this future is dropped first.
    pub async fn stop(&self, user_id: UserId) -> bool {
        let session = {
            let mut registry = self.registry.lock().await;
            match registry.remove(&user_id) {
                None => {
                    tracing::debug!(user_id, "Stop requested but monitoring is not active");
                    return false;
                }
                Some(Slot::Starting(token)) => {
                    token.cancel();
                    tracing::info!(user_id, "Cancelled pending start");
                    return true;
                }
                Some(Slot::Stopping) => {
                    registry.insert(user_id, Slot::Stopping);
                    return false;
                }
                Some(Slot::Running(session)) => {
                    registry.insert(user_id, Slot::Stopping);
                    session
                }
            }
        };

        let registry = self.registry.clone();
        let teardown = tokio::spawn(async move {
            if AssertUnwindSafe(session.shutdown()).catch_unwind().await.is_err() {
                tracing::error!(user_id, "Session teardown panicked");
            }
            registry.lock().await.remove(&user_id);
            tracing::info!(user_id, "Monitoring stopped");
        });
        if let Err(e) = teardown.await {
            tracing::error!(user_id, "Stop task ended abnormally: {}", e);
        }
        true
    }

    /// Stop, pause for the restart delay, then start with the same
    /// configuration the session was running with.
    ///
    /// Users that are not running are started from the store.
    pub async fn restart(&self, user_id: UserId) -> Result<StartStatus, OrchestratorError> {
        let running = {
            let registry = self.registry.lock().await;
            match registry.get(&user_id) {
                Some(Slot::Running(session)) => Some(session.config().clone()),
                _ => None,
            }
        };

        let config = match running {
            Some(config) => config,
            None => self
                .store
                .user_config(user_id)
                .await?
                .ok_or(OrchestratorError::NotFound(user_id))?,
        };

        tracing::info!(user_id, "Restarting monitoring");
        self.stop(user_id).await;
        tokio::time::sleep(self.restart_delay).await;
        self.start_with(config).await
    }

    /// Start every user flagged active in the store.
    ///
    /// Per-user failures are logged and skipped. Returns how many sessions
    /// were started.
    pub async fn start_all_active(&self) -> Result<usize, OrchestratorError> {
        let users = self.store.active_users().await?;
        tracing::info!("Starting monitoring for {} active user(s)", users.len());

        let mut started = 0;
        for config in users {
            let user_id = config.user_id;
            match self.start_with(config).await {
                Ok(StartStatus::Started) => started += 1,
                Ok(StartStatus::AlreadyActive) => {}
                Err(e) => tracing::error!(user_id, "Skipping user at startup: {}", e),
            }
        }
        Ok(started)
    }

    /// Stop every registered session in user id order.
    pub async fn stop_all(&self) {
        let user_ids: Vec<UserId> = self.registry.lock().await.keys().copied().collect();
        tracing::info!("Stopping {} session(s)", user_ids.len());
        for user_id in user_ids {
            self.stop(user_id).await;
        }
    }

    /// Number of users that are starting or running.
    pub async fn active_count(&self) -> usize {
        self.registry
            .lock()
            .await
            .values()
            .filter(|slot| !matches!(slot, Slot::Stopping))
            .count()
    }

    /// Returns true if `user_id` is starting or running.
    pub async fn is_active(&self, user_id: UserId) -> bool {
        matches!(
            self.registry.lock().await.get(&user_id),
            Some(Slot::Starting(_)) | Some(Slot::Running(_))
        )
    }

    /// Summaries of every running session, in user id order.
    pub async fn sessions(&self) -> Vec<SessionSummary> {
        self.registry
            .lock()
            .await
            .values()
            .filter_map(|slot| match slot {
                Slot::Running(session) => Some(session.summary()),
                _ => None,
            })
            .collect()
    }

    /// Summary of one running session.
    pub async fn session(&self, user_id: UserId) -> Option<SessionSummary> {
        match self.registry.lock().await.get(&user_id) {
            Some(Slot::Running(session)) => Some(session.summary()),
            _ => None,
        }
    }

    /// Configuration of one running session.
    pub async fn session_config(&self, user_id: UserId) -> Option<UserConfig> {
        match self.registry.lock().await.get(&user_id) {
            Some(Slot::Running(session)) => Some(session.config().clone()),
            _ => None,
        }
    }
}
