//! Error types for the status monitor

use thiserror::Error;
use wm_config::ConfigError;
use wm_core::CriticalStoreError;

use crate::discovery::DiscoveryError;

/// Errors surfaced by monitor operations
///
/// Unresolvable references and failed channel sends never show up here; they
/// are skipped or logged where they occur.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("critical variables: {0}")]
    CriticalStore(#[from] CriticalStoreError),

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Result type for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;
