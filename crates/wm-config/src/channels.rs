//! Notification channel lists
//!
//! Each channel kind has one list for the Alarm direction and one for the OK
//! direction. A row names the companion instance that delivers the message.

use serde::{Deserialize, Serialize};
use wm_core::ObjectId;

use crate::de;

fn default_true() -> bool {
    true
}

/// Fields shared by every channel row
pub trait ChannelRow {
    fn enabled(&self) -> bool;

    /// Companion instance invoked for this row
    fn target(&self) -> Option<ObjectId>;

    /// A row is actionable when enabled and its target exists
    fn is_actionable(&self, exists: impl Fn(ObjectId) -> bool) -> bool
    where
        Self: Sized,
    {
        self.enabled() && self.target().map(exists).unwrap_or(false)
    }
}

/// In-app (WebFront) notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InAppNotification {
    #[serde(rename = "Use", default = "default_true")]
    pub enabled: bool,

    #[serde(
        rename = "ID",
        default,
        deserialize_with = "de::object_ref",
        serialize_with = "de::serialize_object_ref"
    )]
    pub target: Option<ObjectId>,

    #[serde(rename = "Title", default)]
    pub title: String,

    /// Body template with one `%s` placeholder for the sensor name
    #[serde(rename = "Text", default)]
    pub text: String,

    #[serde(rename = "UseTimestamp", default)]
    pub use_timestamp: bool,

    #[serde(rename = "Icon", default)]
    pub icon: String,

    /// Seconds the notice stays visible, 0 = until dismissed
    #[serde(rename = "DisplayDuration", default)]
    pub display_duration: u32,
}

/// Push notification to the mobile apps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushNotification {
    #[serde(rename = "Use", default = "default_true")]
    pub enabled: bool,

    #[serde(
        rename = "ID",
        default,
        deserialize_with = "de::object_ref",
        serialize_with = "de::serialize_object_ref"
    )]
    pub target: Option<ObjectId>,

    #[serde(rename = "Title", default)]
    pub title: String,

    #[serde(rename = "Text", default)]
    pub text: String,

    #[serde(rename = "UseTimestamp", default)]
    pub use_timestamp: bool,

    #[serde(rename = "Sound", default)]
    pub sound: String,

    /// Object opened when the notification is tapped
    #[serde(
        rename = "TargetID",
        default,
        deserialize_with = "de::object_ref",
        serialize_with = "de::serialize_object_ref"
    )]
    pub open_target: Option<ObjectId>,
}

/// Post (tile) notification in the visualisation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostNotification {
    #[serde(rename = "Use", default = "default_true")]
    pub enabled: bool,

    #[serde(
        rename = "ID",
        default,
        deserialize_with = "de::object_ref",
        serialize_with = "de::serialize_object_ref"
    )]
    pub target: Option<ObjectId>,

    #[serde(rename = "Title", default)]
    pub title: String,

    #[serde(rename = "Text", default)]
    pub text: String,

    #[serde(rename = "UseTimestamp", default)]
    pub use_timestamp: bool,

    #[serde(rename = "Icon", default)]
    pub icon: String,

    #[serde(rename = "Sound", default)]
    pub sound: String,

    #[serde(
        rename = "TargetID",
        default,
        deserialize_with = "de::object_ref",
        serialize_with = "de::serialize_object_ref"
    )]
    pub open_target: Option<ObjectId>,
}

/// E-mail through a mailer instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailerNotification {
    #[serde(rename = "Use", default = "default_true")]
    pub enabled: bool,

    #[serde(
        rename = "ID",
        default,
        deserialize_with = "de::object_ref",
        serialize_with = "de::serialize_object_ref"
    )]
    pub target: Option<ObjectId>,

    #[serde(rename = "Subject", default)]
    pub subject: String,

    #[serde(rename = "Text", default)]
    pub text: String,

    #[serde(rename = "UseTimestamp", default)]
    pub use_timestamp: bool,
}

macro_rules! impl_channel_row {
    ($($row:ty),*) => {
        $(
            impl ChannelRow for $row {
                fn enabled(&self) -> bool {
                    self.enabled
                }

                fn target(&self) -> Option<ObjectId> {
                    self.target
                }
            }
        )*
    };
}

impl_channel_row!(InAppNotification, PushNotification, PostNotification, MailerNotification);

/// The four channel lists of one direction
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelLists<'a> {
    pub in_app: &'a [InAppNotification],
    pub push: &'a [PushNotification],
    pub post: &'a [PostNotification],
    pub mailer: &'a [MailerNotification],
}

impl ChannelLists<'_> {
    /// Total number of rows
    pub fn len(&self) -> usize {
        self.in_app.len() + self.push.len() + self.post.len() + self.mailer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
