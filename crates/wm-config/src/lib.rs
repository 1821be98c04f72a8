//! Configuration for the warning detector
//!
//! The configuration mirrors the host's module properties: the trigger list,
//! the eight notification channel lists, status labels, display options and
//! the automatic update timer. It is loaded from YAML with support for:
//!
//! - `!include path` - Include another YAML file
//! - `!include_dir_merge_list dir` - Concatenate lists from all YAML files in a directory
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use wm_config::load_module_config;
//!
//! let config = load_module_config("/config", "warnmelder.yaml")?;
//! for sensor in config.sensors() {
//!     println!("{} -> {:?}", sensor.designation, sensor.primary_variable());
//! }
//! ```

mod channels;
mod de;
mod error;
mod loader;
mod module_config;
mod secrets;
mod trigger;

pub use channels::{
    ChannelLists, ChannelRow, InAppNotification, MailerNotification, PostNotification,
    PushNotification,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, YamlLoader};
pub use module_config::{
    load_module_config, DisplayOptions, ModuleConfig, StatusLabels, StatusUpdateTimer,
    DEFAULT_ALARM_TEXT, DEFAULT_OK_TEXT, DEFAULT_STATUS_UPDATE_INTERVAL,
};
pub use secrets::Secrets;
pub use trigger::{monitored_sensors, MonitoredSensor, TriggerEntry};
