//! Storage abstraction for JSON persistence
//!
//! Module state lives in a `.storage/` directory next to the configuration,
//! one versioned JSON document per key.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Migration required for {key}: from {from} to {to}")]
    MigrationRequired { key: String, from: u32, to: u32 },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Migration function: raw document and its major version in, current data out
pub type MigrationFn<T> = fn(serde_json::Value, u32) -> StorageResult<T>;

/// Storage file wrapper with version tracking
///
/// JSON format:
/// ```json
/// {
///   "version": 1,
///   "minor_version": 1,
///   "key": "warnmelder.critical_variables",
///   "data": [12345, 23456]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageFile<T> {
    /// Major version - breaking changes
    pub version: u32,
    /// Minor version - compatible additions
    pub minor_version: u32,
    /// Storage key (file name)
    pub key: String,
    pub data: T,
}

impl<T> StorageFile<T> {
    pub fn new(key: impl Into<String>, data: T, version: u32, minor_version: u32) -> Self {
        Self {
            version,
            minor_version,
            key: key.into(),
            data,
        }
    }
}

/// Types persisted under a fixed key
pub trait Storable: Serialize + DeserializeOwned {
    const KEY: &'static str;
    const VERSION: u32;
    const MINOR_VERSION: u32;

    fn to_storage_file(&self) -> StorageFile<&Self> {
        StorageFile::new(Self::KEY, self, Self::VERSION, Self::MINOR_VERSION)
    }
}

/// Handle on the `.storage/` directory
#[derive(Debug, Clone)]
pub struct Storage {
    storage_dir: PathBuf,
}

impl Storage {
    /// Storage below `<config_dir>/.storage`
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: config_dir.as_ref().join(".storage"),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn file_path(&self, key: &str) -> PathBuf {
        self.storage_dir.join(key)
    }

    pub async fn ensure_dir(&self) -> StorageResult<()> {
        if !self.storage_dir.exists() {
            fs::create_dir_all(&self.storage_dir).await?;
            debug!(path = ?self.storage_dir, "Created storage directory");
        }
        Ok(())
    }

    /// Read the raw JSON document of a key, `None` if absent
    pub async fn load_raw(&self, key: &str) -> StorageResult<Option<serde_json::Value>> {
        let path = self.file_path(key);
        if !path.exists() {
            debug!(key, "Storage file not found");
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Load a typed document
    ///
    /// A document written by an older major version goes through `migrate`,
    /// which receives the raw document and its version. Documents without a
    /// version envelope are passed to `migrate` as version 0.
    pub async fn load<T: Storable>(
        &self,
        migrate: Option<MigrationFn<T>>,
    ) -> StorageResult<Option<T>> {
        let Some(raw) = self.load_raw(T::KEY).await? else {
            return Ok(None);
        };

        let version = raw
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(0);

        if version != T::VERSION {
            return match migrate {
                Some(migrate) => {
                    debug!(key = T::KEY, from = version, to = T::VERSION, "Migrating storage");
                    migrate(raw, version).map(Some)
                }
                None => Err(StorageError::MigrationRequired {
                    key: T::KEY.to_string(),
                    from: version,
                    to: T::VERSION,
                }),
            };
        }

        let file: StorageFile<T> = serde_json::from_value(raw)?;
        if file.minor_version < T::MINOR_VERSION {
            warn!(
                key = T::KEY,
                found = file.minor_version,
                current = T::MINOR_VERSION,
                "Storage has older minor version"
            );
        }
        Ok(Some(file.data))
    }

    /// Save a typed document
    ///
    /// Writes atomically by first writing to a temp file, then renaming.
    pub async fn save<T: Storable>(&self, data: &T) -> StorageResult<()> {
        self.ensure_dir().await?;

        let path = self.file_path(T::KEY);
        let temp_path = self.file_path(&format!("{}.tmp", T::KEY));
        let content = serde_json::to_string_pretty(&data.to_storage_file())?;

        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &path).await?;

        debug!(key = T::KEY, version = T::VERSION, "Saved storage file");
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.file_path(key);
        if path.exists() {
            fs::remove_file(&path).await?;
            debug!(key, "Deleted storage file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Counter {
        cycles: u32,
    }

    impl Storable for Counter {
        const KEY: &'static str = "warnmelder.test_counter";
        const VERSION: u32 = 2;
        const MINOR_VERSION: u32 = 1;
    }

    #[tokio::test]
    async fn test_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());

        storage.save(&Counter { cycles: 7 }).await.unwrap();
        assert!(storage.file_path(Counter::KEY).exists());
        assert!(!storage.file_path("warnmelder.test_counter.tmp").exists());

        let loaded: Option<Counter> = storage.load(None).await.unwrap();
        assert_eq!(loaded, Some(Counter { cycles: 7 }));
    }

    #[tokio::test]
    async fn test_load_missing() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());
        let loaded: Option<Counter> = storage.load(None).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());
        storage.ensure_dir().await.unwrap();
        fs::write(
            storage.file_path(Counter::KEY),
            r#"{"version": 1, "minor_version": 1, "key": "warnmelder.test_counter", "data": 3}"#,
        )
        .await
        .unwrap();

        let result: StorageResult<Option<Counter>> = storage.load(None).await;
        assert!(matches!(
            result,
            Err(StorageError::MigrationRequired { from: 1, to: 2, .. })
        ));

        fn migrate(raw: serde_json::Value, _from: u32) -> StorageResult<Counter> {
            let cycles = raw["data"].as_u64().unwrap_or(0) as u32;
            Ok(Counter { cycles })
        }
        let loaded = storage.load(Some(migrate as MigrationFn<Counter>)).await.unwrap();
        assert_eq!(loaded, Some(Counter { cycles: 3 }));
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path());
        storage.save(&Counter { cycles: 1 }).await.unwrap();
        storage.delete(Counter::KEY).await.unwrap();
        assert!(!storage.file_path(Counter::KEY).exists());
    }
}
