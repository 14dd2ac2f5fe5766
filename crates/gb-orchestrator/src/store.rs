//! Per-user configuration storage.
//!
//! [`JsonConfigStore`] keeps every user record in one JSON file as a list of
//! [`RawUserConfig`]. Updates are read-modify-write under a lock and land via
//! a temp file plus rename, so the file is never observed half written.

use gb_types::{RawUserConfig, UserConfig, UserId};
use std::collections::BTreeMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::StoreError;

/// Source of truth for user configuration.
pub trait ConfigStore: Send + Sync + 'static {
    /// Every user flagged active.
    ///
    /// Records that fail validation are logged and left out so one broken
    /// record cannot keep everyone else from starting.
    fn active_users(&self) -> impl Future<Output = Result<Vec<UserConfig>, StoreError>> + Send;

    /// The configuration for `user_id`, if any.
    fn user_config(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<UserConfig>, StoreError>> + Send;

    /// Insert or replace a user's record.
    fn save_user(&self, config: &UserConfig) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Set the active flag. Returns false if the user is unknown.
    fn set_active(
        &self,
        user_id: UserId,
        active: bool,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Remove a user's record. Returns false if the user was unknown.
    fn delete_user(&self, user_id: UserId) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

fn active_configs(records: impl IntoIterator<Item = RawUserConfig>) -> Vec<UserConfig> {
    records
        .into_iter()
        .filter(|raw| raw.is_active)
        .filter_map(|raw| {
            let user_id = raw.user_id;
            UserConfig::from_raw(raw)
                .map_err(|e| tracing::warn!(user_id, "Skipping invalid user record: {}", e))
                .ok()
        })
        .collect()
}

/// File-backed configuration store.
pub struct JsonConfigStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles.
    write_lock: AsyncMutex<()>,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: AsyncMutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(path: &Path, err: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    async fn read_all(&self) -> Result<Vec<RawUserConfig>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_error(&self.path, e)),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Decode(format!("{}: {}", self.path.display(), e)))
    }

    async fn write_all(&self, records: &[RawUserConfig]) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Self::io_error(dir, e))?;
        }

        let payload =
            serde_json::to_vec_pretty(records).map_err(|e| StoreError::Encode(e.to_string()))?;
        let tmp_path = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp_path, payload)
            .await
            .map_err(|e| Self::io_error(&tmp_path, e))?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(Self::io_error(&self.path, e));
        }
        Ok(())
    }
}

impl ConfigStore for JsonConfigStore {
    async fn active_users(&self) -> Result<Vec<UserConfig>, StoreError> {
        Ok(active_configs(self.read_all().await?))
    }

    async fn user_config(&self, user_id: UserId) -> Result<Option<UserConfig>, StoreError> {
        let records = self.read_all().await?;
        match records.into_iter().find(|raw| raw.user_id == user_id) {
            Some(raw) => Ok(Some(UserConfig::from_raw(raw)?)),
            None => Ok(None),
        }
    }

    async fn save_user(&self, config: &UserConfig) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;
        let raw = config.to_raw();

        match records.iter_mut().find(|r| r.user_id == config.user_id) {
            Some(existing) => *existing = raw,
            None => records.push(raw),
        }
        self.write_all(&records).await
    }

    async fn set_active(&self, user_id: UserId, active: bool) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;

        let Some(record) = records.iter_mut().find(|r| r.user_id == user_id) else {
            return Ok(false);
        };
        if record.is_active != active {
            record.is_active = active;
            self.write_all(&records).await?;
        }
        Ok(true)
    }

    async fn delete_user(&self, user_id: UserId) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;

        let before = records.len();
        records.retain(|r| r.user_id != user_id);
        if records.len() == before {
            return Ok(false);
        }
        self.write_all(&records).await?;
        Ok(true)
    }
}

/// In-memory configuration store for tests.
#[derive(Default)]
pub struct MemoryConfigStore {
    records: Mutex<BTreeMap<UserId, RawUserConfig>>,
    fail_writes: AtomicBool,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<UserId, RawUserConfig>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a user (builder pattern).
    pub fn with_user(self, config: UserConfig) -> Self {
        self.insert_raw(config.to_raw());
        self
    }

    /// Add a raw record as-is, valid or not.
    pub fn insert_raw(&self, raw: RawUserConfig) {
        self.records().insert(raw.user_id, raw);
    }

    /// Current active flag, if the user exists.
    pub fn is_active(&self, user_id: UserId) -> Option<bool> {
        self.records().get(&user_id).map(|r| r.is_active)
    }

    /// Make every write fail until switched off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: "memory".into(),
                message: "writes disabled".into(),
            });
        }
        Ok(())
    }
}

impl ConfigStore for MemoryConfigStore {
    async fn active_users(&self) -> Result<Vec<UserConfig>, StoreError> {
        let records: Vec<RawUserConfig> = self.records().values().cloned().collect();
        Ok(active_configs(records))
    }

    async fn user_config(&self, user_id: UserId) -> Result<Option<UserConfig>, StoreError> {
        let raw = self.records().get(&user_id).cloned();
        Ok(raw.map(UserConfig::from_raw).transpose()?)
    }

    async fn save_user(&self, config: &UserConfig) -> Result<(), StoreError> {
        self.check_writable()?;
        self.insert_raw(config.to_raw());
        Ok(())
    }

    async fn set_active(&self, user_id: UserId, active: bool) -> Result<bool, StoreError> {
        self.check_writable()?;
        Ok(self
            .records()
            .get_mut(&user_id)
            .map(|r| r.is_active = active)
            .is_some())
    }

    async fn delete_user(&self, user_id: UserId) -> Result<bool, StoreError> {
        self.check_writable()?;
        Ok(self.records().remove(&user_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(user_id: UserId, active: bool) -> UserConfig {
        let mut raw = RawUserConfig::new(user_id);
        raw.api_id = 1000 + user_id;
        raw.api_hash = "hash".into();
        raw.phone_number = "+1555".into();
        raw.is_active = active;
        raw.gift_ranges = json!([{
            "min_price": 1, "max_price": 100, "supply_limit": 10,
            "quantity": 1, "recipients": ["@bob"]
        }]);
        UserConfig::from_raw(raw).unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path().join("users.json"));
        assert!(store.active_users().await.unwrap().is_empty());
        assert!(store.user_config(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path().join("data").join("users.json"));

        store.save_user(&user(1, true)).await.unwrap();
        store.save_user(&user(2, false)).await.unwrap();

        assert_eq!(store.user_config(1).await.unwrap(), Some(user(1, true)));
        let active: Vec<UserId> = store
            .active_users()
            .await
            .unwrap()
            .iter()
            .map(|c| c.user_id)
            .collect();
        assert_eq!(active, vec![1]);

        assert!(store.set_active(2, true).await.unwrap());
        assert!(!store.set_active(9, true).await.unwrap());
        assert_eq!(store.active_users().await.unwrap().len(), 2);

        assert!(store.delete_user(1).await.unwrap());
        assert!(!store.delete_user(1).await.unwrap());
        assert!(store.user_config(1).await.unwrap().is_none());
        assert!(!dir.path().join("data").join("users.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_reads_legacy_string_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(
            &path,
            json!([{
                "user_id": 5,
                "api_id": 1,
                "api_hash": "h",
                "phone_number": "+1",
                "is_active": true,
                "gift_ranges": "[{\"min_price\":1,\"max_price\":9,\"supply_limit\":5,\"quantity\":2,\"recipients\":\"@a\"}]"
            }])
            .to_string(),
        )
        .unwrap();

        let store = JsonConfigStore::new(path.clone());
        let users = store.active_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].ranges[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_invalid_record_is_skipped_for_active_users() {
        let store = MemoryConfigStore::new().with_user(user(1, true));
        let mut broken = RawUserConfig::new(2);
        broken.is_active = true;
        broken.interval = -1.0;
        store.insert_raw(broken);

        let active = store.active_users().await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(matches!(store.user_config(2).await, Err(StoreError::Invalid(_))));
    }
}
