//! Per-user history of seen items.
//!
//! The history is the single source of truth for "already seen". It is
//! replaced wholesale after every poll cycle, never patched.
//!
//! # Storage format
//!
//! [`JsonHistoryStore`] keeps one file per user, `user_{id}_history.json`,
//! holding the listing as a JSON array of item records in listing order.
//! Records are keyed by their `id` on load. Attributes the engine does not
//! interpret are carried through untouched.
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the target, so a reader sees either the old or the new snapshot.

use gb_types::{ItemRecord, UserId};
use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::error::PersistenceError;

/// Last seen items keyed by id.
pub type HistorySnapshot = HashMap<i64, ItemRecord>;

/// Durable storage of per-user snapshots.
pub trait HistoryStore: Send + Sync + 'static {
    /// Load the snapshot for `user_id`.
    ///
    /// A user with no stored history gets an empty snapshot, not an error.
    fn load(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<HistorySnapshot, PersistenceError>> + Send;

    /// Replace the snapshot for `user_id` with `items`.
    fn save(
        &self,
        user_id: UserId,
        items: &[ItemRecord],
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

fn into_snapshot(items: Vec<ItemRecord>) -> HistorySnapshot {
    items.into_iter().map(|item| (item.id, item)).collect()
}

/// File-backed history store.
pub struct JsonHistoryStore {
    dir: PathBuf,
    tmp_counter: AtomicU64,
}

impl JsonHistoryStore {
    /// Store snapshots under `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            tmp_counter: AtomicU64::new(0),
        }
    }

    /// Path of the snapshot file for `user_id`.
    pub fn path_for(&self, user_id: UserId) -> PathBuf {
        self.dir.join(format!("user_{}_history.json", user_id))
    }

    fn io_error(path: &Path, err: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl HistoryStore for JsonHistoryStore {
    async fn load(&self, user_id: UserId) -> Result<HistorySnapshot, PersistenceError> {
        let path = self.path_for(user_id);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HistorySnapshot::new()),
            Err(e) => return Err(Self::io_error(&path, e)),
        };

        let items: Vec<ItemRecord> = serde_json::from_slice(&bytes)
            .map_err(|e| PersistenceError::Decode(format!("{}: {}", path.display(), e)))?;
        Ok(into_snapshot(items))
    }

    async fn save(&self, user_id: UserId, items: &[ItemRecord]) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Self::io_error(&self.dir, e))?;

        let payload =
            serde_json::to_vec_pretty(items).map_err(|e| PersistenceError::Encode(e.to_string()))?;

        let path = self.path_for(user_id);
        let seq = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp_path = path.with_extension(format!("json.{}.tmp", seq));

        tokio::fs::write(&tmp_path, payload)
            .await
            .map_err(|e| Self::io_error(&tmp_path, e))?;

        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(Self::io_error(&path, e));
        }

        tracing::trace!(user_id, "Saved history snapshot ({} items)", items.len());
        Ok(())
    }
}

/// In-memory history store for tests.
///
/// Failures can be switched on to exercise the loop's degraded paths.
#[derive(Default)]
pub struct MemoryHistoryStore {
    snapshots: RwLock<HashMap<UserId, Vec<ItemRecord>>>,
    fail_load: AtomicBool,
    fail_save: AtomicBool,
    saves: AtomicU64,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `load` fail until switched off.
    pub fn set_fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    /// Make every `save` fail until switched off.
    pub fn set_fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    /// Stored records for `user_id`, in the order they were saved.
    pub async fn stored(&self, user_id: UserId) -> Option<Vec<ItemRecord>> {
        self.snapshots.read().await.get(&user_id).cloned()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

impl HistoryStore for MemoryHistoryStore {
    async fn load(&self, user_id: UserId) -> Result<HistorySnapshot, PersistenceError> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(PersistenceError::Decode("memory store load failure".into()));
        }
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(&user_id)
            .cloned()
            .map(into_snapshot)
            .unwrap_or_default())
    }

    async fn save(&self, user_id: UserId, items: &[ItemRecord]) -> Result<(), PersistenceError> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(PersistenceError::Io {
                path: "memory".into(),
                message: "memory store save failure".into(),
            });
        }
        self.snapshots.write().await.insert(user_id, items.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
