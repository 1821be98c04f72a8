//! Persistence for the warning detector
//!
//! Versioned JSON documents under `<config>/.storage/` and the
//! [`CriticalStore`](wm_core::CriticalStore) backends built on them.

mod critical_store;
mod storage;

pub use critical_store::{
    CriticalVariables, MemoryCriticalStore, StorageCriticalStore, CRITICAL_VARIABLES_KEY,
};
pub use storage::{MigrationFn, Storable, Storage, StorageError, StorageFile, StorageResult};
