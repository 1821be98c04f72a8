//! Warnmelder service
//!
//! Loads the module configuration and the host object seed from a config
//! directory, then runs the warning detector until interrupted.
//!
//! ```text
//! warnmelder [CONFIG_DIR]
//! ```
//!
//! The directory defaults to `$WARNMELDER_CONFIG`, then the working directory.

mod engine;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wm_condition::RuleTreeEvaluator;
use wm_config::{load_module_config, load_yaml};
use wm_core::events::KernelStartedData;
use wm_event_bus::EventBus;
use wm_monitor::Warnmelder;
use wm_notify::NoticeBoard;
use wm_object_space::{HostObject, MemoryObjectSpace};
use wm_storage::{Storage, StorageCriticalStore};

use crate::engine::MonitorEngine;

const CONFIG_DIR_ENV: &str = "WARNMELDER_CONFIG";
const CONFIG_FILE: &str = "warnmelder.yaml";
const OBJECTS_FILE: &str = "objects.yaml";

fn config_dir() -> PathBuf {
    std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Fill the object space from `objects.yaml`, if present
fn seed_objects(objects: &MemoryObjectSpace, config_dir: &Path) -> Result<usize> {
    if !config_dir.join(OBJECTS_FILE).exists() {
        return Ok(0);
    }
    let value = load_yaml(config_dir, OBJECTS_FILE)?;
    let seed: Vec<HostObject> =
        serde_yaml::from_value(value).with_context(|| format!("invalid {}", OBJECTS_FILE))?;
    let count = seed.len();
    objects.extend(seed);
    Ok(count)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_dir = config_dir();
    info!(config_dir = ?config_dir, "Starting Warnmelder");

    let event_bus = Arc::new(EventBus::new());
    let objects = Arc::new(MemoryObjectSpace::with_event_bus(event_bus.clone()));
    let seeded = seed_objects(&objects, &config_dir)?;
    info!(objects = seeded, "Object space ready");

    let config = load_module_config(&config_dir, CONFIG_FILE)
        .with_context(|| format!("failed to load {}", CONFIG_FILE))?;

    let monitor = Warnmelder::new(
        config,
        objects.clone(),
        Arc::new(RuleTreeEvaluator::new(objects.clone())),
        Arc::new(StorageCriticalStore::new(Storage::new(&config_dir))),
        Arc::new(NoticeBoard::new()),
    )
    .with_event_bus(event_bus.clone());

    let engine = MonitorEngine::new(event_bus.clone(), Arc::new(monitor));
    engine.start().await;

    event_bus.fire_typed(KernelStartedData {});
    info!("Warnmelder is running");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    engine.stop();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use wm_core::ObjectId;
    use wm_object_space::ObjectSpace;

    #[test]
    fn test_seed_objects() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(OBJECTS_FILE),
            r#"
- id: 12000
  name: Fenster Bad
  type: instance
  properties:
    Address: "OEQ0000001:1"
- id: 12001
  name: STATE
  parent: 12000
  ident: STATE
  type: variable
  value: false
  profile: "~Window"
"#,
        )
        .unwrap();

        let objects = MemoryObjectSpace::new();
        assert_eq!(seed_objects(&objects, dir.path()).unwrap(), 2);
        let id = ObjectId::new(12001).unwrap();
        assert_eq!(objects.variable_ids(), vec![id]);
        assert_eq!(objects.name(id).as_deref(), Some("STATE"));
    }

    #[test]
    fn test_seed_objects_missing_file() {
        let dir = TempDir::new().unwrap();
        let objects = MemoryObjectSpace::new();
        assert_eq!(seed_objects(&objects, dir.path()).unwrap(), 0);
        assert_eq!(objects.object_count(), 0);
    }
}
