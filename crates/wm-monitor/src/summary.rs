//! Read-only summaries of the configuration and the critical set
//!
//! These back a configuration view: every trigger list entry and channel row
//! with a validity state and row colour, and the stored critical variables
//! with their names.

use serde::{Deserialize, Serialize};
use wm_config::{ChannelRow, ModuleConfig, MonitoredSensor, StatusLabels};
use wm_core::ObjectId;
use wm_object_space::ObjectSpace;

use crate::status::StatusEvaluator;

/// State label of a broken trigger list entry
pub const STATE_BROKEN: &str = "fehlerhaft";

/// State label of a disabled trigger list entry
pub const STATE_DISABLED: &str = "deaktiviert";

/// Validity of a configured row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowState {
    /// A referenced object is missing or a sentinel
    Invalid,
    /// Valid but switched off
    Disabled,
    Valid,
}

impl RowState {
    fn from_row(valid: bool, enabled: bool) -> Self {
        match (valid, enabled) {
            (false, _) => RowState::Invalid,
            (true, false) => RowState::Disabled,
            (true, true) => RowState::Valid,
        }
    }

    /// Row colour of the configuration view
    pub fn color(&self) -> &'static str {
        match self {
            RowState::Invalid => "#FFC0C0",
            RowState::Disabled => "#DFDFDF",
            RowState::Valid => "#C0FFC0",
        }
    }
}

/// One trigger list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerListRow {
    pub position: usize,
    pub designation: String,
    pub sensor_id: Option<ObjectId>,
    /// Location of the sensor variable, empty unless valid
    pub location: String,
    pub state: RowState,
    /// `fehlerhaft`, `deaktiviert` or the sensor's current status label
    pub status_text: String,
    pub row_color: String,
}

/// One row of a channel list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelListRow {
    /// Property name of the list, e.g. `PushNotificationAlarm`
    pub list: String,
    pub position: usize,
    pub target: Option<ObjectId>,
    pub state: RowState,
    pub row_color: String,
}

/// An object identity with its name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRow {
    pub object_id: ObjectId,
    /// Object name, or `Objekt #<id> existiert nicht`
    pub name: String,
    pub exists: bool,
    pub row_color: String,
}

/// Summarize the trigger list
pub fn trigger_list_rows(
    sensors: &[MonitoredSensor],
    objects: &dyn ObjectSpace,
    evaluator: &StatusEvaluator,
    labels: &StatusLabels,
) -> Vec<TriggerListRow> {
    sensors
        .iter()
        .map(|sensor| {
            let sensor_id = sensor.primary_variable();
            let valid = sensor.is_configured(|id| objects.object_exists(id));
            let state = RowState::from_row(valid, sensor.enabled);

            let status_text = match state {
                RowState::Invalid => STATE_BROKEN.to_string(),
                RowState::Disabled => STATE_DISABLED.to_string(),
                RowState::Valid => evaluator
                    .classify(sensor)
                    .map(|c| labels.sensor_text(c).to_string())
                    .unwrap_or_else(|| STATE_BROKEN.to_string()),
            };
            let location = match (state, sensor_id) {
                (RowState::Invalid, _) | (_, None) => String::new(),
                (_, Some(id)) => objects.location(id).unwrap_or_default(),
            };

            TriggerListRow {
                position: sensor.id,
                designation: sensor.designation.clone(),
                sensor_id,
                location,
                state,
                status_text,
                row_color: state.color().to_string(),
            }
        })
        .collect()
}

fn rows_of<R: ChannelRow>(
    list: &str,
    rows: &[R],
    objects: &dyn ObjectSpace,
    out: &mut Vec<ChannelListRow>,
) {
    for (position, row) in rows.iter().enumerate() {
        let target = row.target();
        let valid = target.map(|id| objects.object_exists(id)).unwrap_or(false);
        let state = RowState::from_row(valid, row.enabled());
        out.push(ChannelListRow {
            list: list.to_string(),
            position,
            target,
            state,
            row_color: state.color().to_string(),
        });
    }
}

/// Summarize all eight channel lists
pub fn channel_list_rows(config: &ModuleConfig, objects: &dyn ObjectSpace) -> Vec<ChannelListRow> {
    let mut out = Vec::new();
    rows_of("NotificationAlarm", &config.notification_alarm, objects, &mut out);
    rows_of("PushNotificationAlarm", &config.push_notification_alarm, objects, &mut out);
    rows_of("PostNotificationAlarm", &config.post_notification_alarm, objects, &mut out);
    rows_of("MailerNotificationAlarm", &config.mailer_notification_alarm, objects, &mut out);
    rows_of("Notification", &config.notification, objects, &mut out);
    rows_of("PushNotification", &config.push_notification, objects, &mut out);
    rows_of("PostNotification", &config.post_notification, objects, &mut out);
    rows_of("MailerNotification", &config.mailer_notification, objects, &mut out);
    out
}

/// Name every identity, flagging the ones that no longer exist
pub fn object_rows(ids: impl IntoIterator<Item = ObjectId>, objects: &dyn ObjectSpace) -> Vec<ObjectRow> {
    ids.into_iter()
        .map(|object_id| match objects.name(object_id) {
            Some(name) => ObjectRow {
                object_id,
                name,
                exists: true,
                row_color: RowState::Valid.color().to_string(),
            },
            None => ObjectRow {
                object_id,
                name: format!("Objekt #{} existiert nicht", object_id),
                exists: false,
                row_color: RowState::Invalid.color().to_string(),
            },
        })
        .collect()
}
