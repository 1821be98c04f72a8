//! The module configuration
//!
//! Field names follow the host property names so a property dump of an
//! existing instance can be loaded as-is.
//!
//! # Example
//!
//! ```yaml
//! StatusTextAlarm: "🔴 Alarm"
//! AutomaticStatusUpdate: true
//! StatusUpdateInterval: 300
//! TriggerList:
//!   - Designation: Rauchmelder Flur
//!     Comment: OEQ1234567:1
//!     PrimaryCondition: '[{"id":0,"parentID":0,"operation":0,"rules":{"variable":[{"id":0,"variableID":12345,"comparison":0,"value":true,"type":0}]}}]'
//! NotificationAlarm:
//!   - ID: 23456
//!     Title: Warnmelder
//!     Text: "%s hat ausgelöst!"
//!     UseTimestamp: true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use wm_core::Classification;

use crate::channels::{
    ChannelLists, InAppNotification, MailerNotification, PostNotification, PushNotification,
};
use crate::de;
use crate::error::{ConfigError, ConfigResult};
use crate::loader::YamlLoader;
use crate::trigger::{monitored_sensors, MonitoredSensor, TriggerEntry};

/// Default label for Alarm
pub const DEFAULT_ALARM_TEXT: &str = "🔴 Alarm";

/// Default label for OK
pub const DEFAULT_OK_TEXT: &str = "🟢 OK";

/// Default automatic update interval in seconds
pub const DEFAULT_STATUS_UPDATE_INTERVAL: u64 = 60;

/// Which published values are shown, and which rows the sensor list contains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    #[serde(rename = "EnableActive")]
    pub active: bool,

    #[serde(rename = "EnableStatus")]
    pub status: bool,

    #[serde(rename = "EnableTriggeringDetector")]
    pub triggering_detector: bool,

    #[serde(rename = "EnableLastUpdate")]
    pub last_update: bool,

    #[serde(rename = "EnableUpdateStatus")]
    pub update_status: bool,

    /// Render the HTML sensor list at all
    #[serde(rename = "EnableAlarmSensorList")]
    pub alarm_sensor_list: bool,

    /// List Alarm rows in the sensor list
    #[serde(rename = "EnableAlarm")]
    pub alarm_rows: bool,

    /// List OK rows in the sensor list
    #[serde(rename = "EnableOK")]
    pub ok_rows: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            active: false,
            status: true,
            triggering_detector: true,
            last_update: true,
            update_status: true,
            alarm_sensor_list: true,
            alarm_rows: true,
            ok_rows: true,
        }
    }
}

impl DisplayOptions {
    /// Published values hidden from the visualisation
    pub fn hidden_values(&self) -> Vec<&'static str> {
        [
            ("Active", self.active),
            ("Status", self.status),
            ("TriggeringDetector", self.triggering_detector),
            ("LastUpdate", self.last_update),
            ("UpdateStatus", self.update_status),
            ("AlarmSensorList", self.alarm_sensor_list),
        ]
        .into_iter()
        .filter(|(_, shown)| !shown)
        .map(|(name, _)| name)
        .collect()
    }
}

/// Labels for the two classifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusLabels {
    /// Overall status label for Alarm
    #[serde(rename = "StatusTextAlarm")]
    pub alarm: String,

    /// Overall status label for OK
    #[serde(rename = "StatusTextOK")]
    pub ok: String,

    /// Per-sensor label for Alarm, used in snapshots and the sensor list
    #[serde(rename = "SensorListStatusTextAlarm")]
    pub sensor_alarm: String,

    /// Per-sensor label for OK
    #[serde(rename = "SensorListStatusTextOK")]
    pub sensor_ok: String,
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            alarm: DEFAULT_ALARM_TEXT.to_string(),
            ok: DEFAULT_OK_TEXT.to_string(),
            sensor_alarm: DEFAULT_ALARM_TEXT.to_string(),
            sensor_ok: DEFAULT_OK_TEXT.to_string(),
        }
    }
}

impl StatusLabels {
    pub fn overall_text(&self, classification: Classification) -> &str {
        match classification {
            Classification::Alarm => &self.alarm,
            Classification::Ok => &self.ok,
        }
    }

    pub fn sensor_text(&self, classification: Classification) -> &str {
        match classification {
            Classification::Alarm => &self.sensor_alarm,
            Classification::Ok => &self.sensor_ok,
        }
    }
}

/// Automatic status update timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusUpdateTimer {
    #[serde(rename = "AutomaticStatusUpdate")]
    pub enabled: bool,

    /// Interval in seconds
    #[serde(rename = "StatusUpdateInterval")]
    pub interval: u64,
}

impl Default for StatusUpdateTimer {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: DEFAULT_STATUS_UPDATE_INTERVAL,
        }
    }
}

impl StatusUpdateTimer {
    /// Timer period, `None` when the timer is off
    pub fn period(&self) -> Option<Duration> {
        (self.enabled && self.interval > 0).then(|| Duration::from_secs(self.interval))
    }
}

/// The complete module configuration
///
/// An immutable snapshot: the monitor reads one per status cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    #[serde(rename = "Note")]
    pub note: String,

    #[serde(flatten)]
    pub display: DisplayOptions,

    #[serde(flatten)]
    pub labels: StatusLabels,

    #[serde(flatten)]
    pub timer: StatusUpdateTimer,

    #[serde(rename = "TriggerList", deserialize_with = "de::list")]
    pub trigger_list: Vec<TriggerEntry>,

    #[serde(rename = "NotificationAlarm", deserialize_with = "de::list")]
    pub notification_alarm: Vec<InAppNotification>,

    #[serde(rename = "PushNotificationAlarm", deserialize_with = "de::list")]
    pub push_notification_alarm: Vec<PushNotification>,

    #[serde(rename = "PostNotificationAlarm", deserialize_with = "de::list")]
    pub post_notification_alarm: Vec<PostNotification>,

    #[serde(rename = "MailerNotificationAlarm", deserialize_with = "de::list")]
    pub mailer_notification_alarm: Vec<MailerNotification>,

    #[serde(rename = "Notification", deserialize_with = "de::list")]
    pub notification: Vec<InAppNotification>,

    #[serde(rename = "PushNotification", deserialize_with = "de::list")]
    pub push_notification: Vec<PushNotification>,

    #[serde(rename = "PostNotification", deserialize_with = "de::list")]
    pub post_notification: Vec<PostNotification>,

    #[serde(rename = "MailerNotification", deserialize_with = "de::list")]
    pub mailer_notification: Vec<MailerNotification>,
}

impl ModuleConfig {
    /// Decode a host property dump (list properties may be JSON strings)
    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Decode from an already tag-processed YAML value
    pub fn from_yaml_value(value: serde_yaml::Value, source: &Path) -> ConfigResult<Self> {
        let config: Self = match value {
            serde_yaml::Value::Null => Self::default(),
            value => serde_yaml::from_value(value).map_err(|e| ConfigError::ParseYaml {
                path: source.to_path_buf(),
                source: e,
            })?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the values that cannot be defaulted away
    pub fn validate(&self) -> ConfigResult<()> {
        if self.timer.enabled && self.timer.interval == 0 {
            return Err(ConfigError::InvalidValue {
                key: "StatusUpdateInterval".to_string(),
                reason: "must be greater than 0 when AutomaticStatusUpdate is on".to_string(),
            });
        }

        for (key, label) in [
            ("SensorListStatusTextAlarm", &self.labels.sensor_alarm),
            ("SensorListStatusTextOK", &self.labels.sensor_ok),
        ] {
            if label.trim().is_empty() {
                warn!(key, "Status label is empty");
            }
        }

        for (position, entry) in self.trigger_list.iter().enumerate() {
            if entry.enabled && entry.primary_variable().is_none() {
                warn!(position, designation = %entry.designation, "Trigger list entry has no valid primary variable");
            }
        }

        Ok(())
    }

    /// Decoded trigger list
    pub fn sensors(&self) -> Vec<MonitoredSensor> {
        monitored_sensors(&self.trigger_list)
    }

    /// Channel lists notified for a transition into `direction`
    pub fn channel_lists(&self, direction: Classification) -> ChannelLists<'_> {
        match direction {
            Classification::Alarm => ChannelLists {
                in_app: &self.notification_alarm,
                push: &self.push_notification_alarm,
                post: &self.post_notification_alarm,
                mailer: &self.mailer_notification_alarm,
            },
            Classification::Ok => ChannelLists {
                in_app: &self.notification,
                push: &self.push_notification,
                post: &self.post_notification,
                mailer: &self.mailer_notification,
            },
        }
    }
}

/// Load the module configuration from a YAML (or JSON) file in the config directory
pub fn load_module_config(
    config_dir: impl Into<PathBuf>,
    file: impl AsRef<Path>,
) -> ConfigResult<ModuleConfig> {
    let mut loader = YamlLoader::new(config_dir)?;
    let path = loader.config_dir().join(file.as_ref());
    let value = loader.load_file(&path)?;
    let config = ModuleConfig::from_yaml_value(value, &path)?;
    debug!(
        path = ?path,
        sensors = config.trigger_list.len(),
        alarm_channels = config.channel_lists(Classification::Alarm).len(),
        ok_channels = config.channel_lists(Classification::Ok).len(),
        "Loaded module configuration"
    );
    Ok(config)
}
