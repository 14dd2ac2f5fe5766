//! The per-user detection loop.
//!
//! One [`DetectionLoop`] drives one user's poll, diff and dispatch cycle
//! against that user's transport handle:
//!
//! ```text
//! POLLING ─► DIFFING ─► DISPATCHING ─► PERSISTING ─► WAITING ─┐
//!    ▲                                                         │
//!    └─────────────────────────────────────────────────────────┘
//! any state ─► CANCELLED        (cancellation token, cycle boundaries only)
//! ```
//!
//! # Cancellation
//!
//! The token is checked before each cycle and raced against the interval
//! sleep. A cycle that has started always runs to the end of its persist
//! step, so a stop never leaves a half-forwarded batch or a torn snapshot.
//!
//! # Failure handling
//!
//! - Connect or fetch failure: logged, the cycle ends and the loop waits one
//!   interval before retrying.
//! - History load failure: treated as "nothing seen yet".
//! - History save failure: logged; the fresh snapshot is carried in memory
//!   and used as the previous snapshot for the next cycle.
//! - A forwarding or notification failure: logged, the batch continues.
//! - A panic inside a cycle: caught here, logged, and the loop ends in
//!   [`LoopPhase::Failed`] without touching other users' loops.

use futures::FutureExt;
use gb_ingestion::{Transport, TransportError};
use gb_types::{ItemRecord, UserConfig};
use serde::Serialize;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::acquisition::{AcquisitionHandler, AcquisitionOutcome};
use crate::classifier::{prioritize, SkipTally};
use crate::history::{HistorySnapshot, HistoryStore};
use crate::notify::NotificationSink;

/// Where a loop currently is in its cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    #[default]
    Polling,
    Diffing,
    Dispatching,
    Persisting,
    Waiting,
    /// Terminal: stopped by its cancellation token.
    Cancelled,
    /// Terminal: a cycle panicked.
    Failed,
}

impl LoopPhase {
    /// Returns true for the two terminal phases.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopPhase::Cancelled | LoopPhase::Failed)
    }
}

/// Observable state of a running loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopStatus {
    pub phase: LoopPhase,
    /// Completed cycles, successful or not.
    pub cycles: u64,
    /// Error of the most recent failed cycle, cleared by the next success.
    pub last_error: Option<String>,
}

/// What one successful cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Items in the current listing.
    pub listed: usize,
    /// Ids forwarded this cycle, in forwarding order.
    pub forwarded: Vec<i64>,
    pub tally: SkipTally,
    /// Items the handler acquired at least one unit of.
    pub acquired: usize,
    /// Items whose forwarding returned an error.
    pub dispatch_errors: usize,
    /// Whether the snapshot reached durable storage.
    pub persisted: bool,
}

/// The current listing, deduplicated by id with the first occurrence kept.
struct Listing {
    items: Vec<ItemRecord>,
    ids: Vec<i64>,
}

impl Listing {
    fn new(raw: Vec<ItemRecord>) -> Self {
        let mut seen = HashSet::with_capacity(raw.len());
        let items: Vec<ItemRecord> = raw.into_iter().filter(|item| seen.insert(item.id)).collect();
        let ids = items.iter().map(|item| item.id).collect();
        Self { items, ids }
    }

    fn snapshot(&self) -> HistorySnapshot {
        self.items.iter().map(|item| (item.id, item.clone())).collect()
    }
}

/// One user's detection loop.
pub struct DetectionLoop<T, H, N, A> {
    config: Arc<UserConfig>,
    transport: Arc<T>,
    history: Arc<H>,
    notifier: Arc<N>,
    handler: Arc<A>,
    status: watch::Sender<LoopStatus>,
    /// Snapshot of a cycle whose save failed, used instead of the store.
    carried: Option<HistorySnapshot>,
}

impl<T, H, N, A> DetectionLoop<T, H, N, A>
where
    T: Transport,
    H: HistoryStore,
    N: NotificationSink,
    A: AcquisitionHandler,
{
    pub fn new(
        config: Arc<UserConfig>,
        transport: Arc<T>,
        history: Arc<H>,
        notifier: Arc<N>,
        handler: Arc<A>,
    ) -> Self {
        let (status, _) = watch::channel(LoopStatus::default());
        Self {
            config,
            transport,
            history,
            notifier,
            handler,
            status,
            carried: None,
        }
    }

    /// Subscribe to phase and cycle updates.
    pub fn subscribe(&self) -> watch::Receiver<LoopStatus> {
        self.status.subscribe()
    }

    fn set_phase(&self, phase: LoopPhase) {
        self.status.send_modify(|s| s.phase = phase);
    }

    /// Run until `cancel` fires or a cycle panics.
    pub async fn run(mut self, cancel: CancellationToken) -> LoopPhase {
        let user_id = self.config.user_id;
        let interval = self.config.poll_interval();
        tracing::info!(user_id, "Detection loop started (interval {:?})", interval);

        let exit = loop {
            if cancel.is_cancelled() {
                break LoopPhase::Cancelled;
            }

            match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
                Ok(Ok(report)) => {
                    self.status.send_modify(|s| {
                        s.cycles += 1;
                        s.last_error = None;
                    });
                    tracing::debug!(
                        user_id,
                        listed = report.listed,
                        forwarded = report.forwarded.len(),
                        "Cycle complete"
                    );
                }
                Ok(Err(e)) => {
                    self.status.send_modify(|s| {
                        s.cycles += 1;
                        s.last_error = Some(e.to_string());
                    });
                    tracing::warn!(user_id, "Cycle failed, retrying after {:?}: {}", interval, e);
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(user_id, "Detection loop panicked: {}", message);
                    self.status.send_modify(|s| s.last_error = Some(message));
                    break LoopPhase::Failed;
                }
            }

            self.set_phase(LoopPhase::Waiting);
            tokio::select! {
                _ = cancel.cancelled() => break LoopPhase::Cancelled,
                _ = tokio::time::sleep(interval) => {}
            }
        };

        self.set_phase(exit);
        if exit == LoopPhase::Cancelled {
            tracing::info!(user_id, "Detection loop cancelled");
        }
        exit
    }

    /// Run one cycle: connect if needed, fetch, diff, dispatch, persist.
    ///
    /// # Errors
    ///
    /// Only transport failures before the diff end a cycle early. Everything
    /// after that is logged and absorbed.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, TransportError> {
        let user_id = self.config.user_id;
        self.set_phase(LoopPhase::Polling);

        if !self.transport.is_connected() {
            tracing::info!(user_id, "Transport disconnected, reconnecting");
            self.transport.connect().await?;
        }

        let previous = self.previous_snapshot().await;
        let listing = Listing::new(self.transport.list_current_items().await?);

        self.set_phase(LoopPhase::Diffing);
        let new_items: Vec<ItemRecord> = listing
            .items
            .iter()
            .filter(|item| !previous.contains_key(&item.id))
            .cloned()
            .collect();

        let mut report = CycleReport {
            listed: listing.items.len(),
            ..CycleReport::default()
        };

        if !new_items.is_empty() {
            self.set_phase(LoopPhase::Dispatching);
            self.dispatch(new_items, &listing.ids, &mut report).await;
        }

        self.set_phase(LoopPhase::Persisting);
        match self.history.save(user_id, &listing.items).await {
            Ok(()) => {
                self.carried = None;
                report.persisted = true;
            }
            Err(e) => {
                tracing::error!(user_id, "Failed to save history, keeping snapshot in memory: {}", e);
                self.carried = Some(listing.snapshot());
            }
        }

        Ok(report)
    }

    async fn previous_snapshot(&self) -> HistorySnapshot {
        if let Some(carried) = &self.carried {
            return carried.clone();
        }

        match self.history.load(self.config.user_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(
                    user_id = self.config.user_id,
                    "Failed to load history, treating as empty: {}",
                    e
                );
                HistorySnapshot::new()
            }
        }
    }

    async fn dispatch(&self, new_items: Vec<ItemRecord>, listing: &[i64], report: &mut CycleReport) {
        let config = self.config.as_ref();
        let user_id = config.user_id;
        tracing::info!(user_id, "New gifts detected: {}", new_items.len());

        report.tally = SkipTally::from_items(&new_items, config.upgradable_only);

        for entry in prioritize(new_items, listing, config.prioritize_low_supply) {
            let item_id = entry.item.id;
            report.forwarded.push(item_id);

            match self.handler.handle(self.transport.as_ref(), config, &entry.item).await {
                Ok(AcquisitionOutcome::Acquired { sent, .. }) if sent > 0 => report.acquired += 1,
                Ok(_) => {}
                Err(e) => {
                    report.dispatch_errors += 1;
                    tracing::error!(user_id, item_id, position = entry.position, "Failed to process gift: {}", e);
                }
            }
        }

        if let Err(e) = self
            .notifier
            .send_summary(self.transport.as_ref(), config, &report.tally)
            .await
        {
            tracing::warn!(user_id, "Failed to send cycle summary: {}", e);
        }

        if !report.tally.is_empty() {
            let tally = &report.tally;
            tracing::info!(
                user_id,
                sold_out = tally.sold_out,
                non_limited = tally.non_limited,
                non_upgradable = tally.non_upgradable,
                "Skip summary"
            );
        }
    }
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
