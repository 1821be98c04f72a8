//! Backends for the `CriticalVariables` set

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use wm_core::{CriticalSet, CriticalStore, CriticalStoreError};

use crate::storage::{MigrationFn, Storable, Storage, StorageError, StorageResult};

/// Storage key of the critical set
pub const CRITICAL_VARIABLES_KEY: &str = "warnmelder.critical_variables";

/// Persisted form of the critical set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriticalVariables(pub CriticalSet);

impl Storable for CriticalVariables {
    const KEY: &'static str = CRITICAL_VARIABLES_KEY;
    const VERSION: u32 = 1;
    const MINOR_VERSION: u32 = 1;
}

/// Accept a bare identity array, the host attribute format
fn migrate_attribute(raw: serde_json::Value, from: u32) -> StorageResult<CriticalVariables> {
    debug!(from, "Importing critical variables attribute");
    Ok(serde_json::from_value(raw)?)
}

impl From<StorageError> for CriticalStoreError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Json(e) => CriticalStoreError::Corrupt(e.to_string()),
            other => CriticalStoreError::Backend(Box::new(other)),
        }
    }
}

/// Critical set kept in `.storage/warnmelder.critical_variables`
#[derive(Debug, Clone)]
pub struct StorageCriticalStore {
    storage: Storage,
}

impl StorageCriticalStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl CriticalStore for StorageCriticalStore {
    #[instrument(skip(self))]
    async fn load(&self) -> Result<CriticalSet, CriticalStoreError> {
        let stored: Option<CriticalVariables> = self
            .storage
            .load(Some(migrate_attribute as MigrationFn<CriticalVariables>))
            .await?;
        Ok(stored.map(|v| v.0).unwrap_or_default())
    }

    #[instrument(skip(self, set), fields(len = set.len()))]
    async fn save(&self, set: &CriticalSet) -> Result<(), CriticalStoreError> {
        self.storage.save(&CriticalVariables(set.clone())).await?;
        Ok(())
    }
}

/// Critical set held in memory
#[derive(Debug, Default)]
pub struct MemoryCriticalStore {
    set: RwLock<CriticalSet>,
    saves: AtomicUsize,
}

impl MemoryCriticalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_set(set: CriticalSet) -> Self {
        Self {
            set: RwLock::new(set),
            saves: AtomicUsize::new(0),
        }
    }

    /// Current content without going through the trait
    pub async fn snapshot(&self) -> CriticalSet {
        self.set.read().await.clone()
    }

    /// Number of saves so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CriticalStore for MemoryCriticalStore {
    async fn load(&self) -> Result<CriticalSet, CriticalStoreError> {
        Ok(self.set.read().await.clone())
    }

    async fn save(&self, set: &CriticalSet) -> Result<(), CriticalStoreError> {
        *self.set.write().await = set.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wm_core::ObjectId;

    fn set(ids: &[i64]) -> CriticalSet {
        ids.iter().map(|raw| ObjectId::new(*raw).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_storage_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = StorageCriticalStore::new(Storage::new(temp_dir.path()));

        assert!(store.load().await.unwrap().is_empty());

        store.save(&set(&[23456, 12345])).await.unwrap();
        assert_eq!(store.load().await.unwrap(), set(&[12345, 23456]));

        let raw = std::fs::read_to_string(
            temp_dir.path().join(".storage").join(CRITICAL_VARIABLES_KEY),
        )
        .unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["version"], 1);
        assert_eq!(doc["data"], serde_json::json!([12345, 23456]));
    }

    #[tokio::test]
    async fn test_import_attribute_format() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());
        storage.ensure_dir().await.unwrap();
        std::fs::write(storage.file_path(CRITICAL_VARIABLES_KEY), "[12345, 0, \"23456\"]").unwrap();

        let store = StorageCriticalStore::new(storage);
        assert_eq!(store.load().await.unwrap(), set(&[12345, 23456]));
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());
        storage.ensure_dir().await.unwrap();
        std::fs::write(storage.file_path(CRITICAL_VARIABLES_KEY), "{not json").unwrap();

        let store = StorageCriticalStore::new(storage);
        assert!(matches!(
            store.load().await,
            Err(CriticalStoreError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryCriticalStore::with_set(set(&[12345]));
        assert_eq!(store.load().await.unwrap(), set(&[12345]));
        store.save(&CriticalSet::new()).await.unwrap();
        assert!(store.snapshot().await.is_empty());
        assert_eq!(store.save_count(), 1);
    }
}
