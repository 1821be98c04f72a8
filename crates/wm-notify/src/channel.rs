//! Channel requests and the sender seam

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use wm_core::ObjectId;

/// Delivery mechanism of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Notice in the visualisation
    InApp,
    /// Push message to the mobile apps
    Push,
    /// Post (tile) message in the visualisation
    Post,
    /// E-mail through a mailer instance
    Mailer,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::InApp => "in_app",
            ChannelKind::Push => "push",
            ChannelKind::Post => "post",
            ChannelKind::Mailer => "mailer",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered message for one channel row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelRequest {
    InApp {
        target: ObjectId,
        title: String,
        text: String,
        icon: String,
        display_duration: u32,
    },
    Push {
        target: ObjectId,
        title: String,
        text: String,
        sound: String,
        open_target: Option<ObjectId>,
    },
    Post {
        target: ObjectId,
        title: String,
        text: String,
        icon: String,
        sound: String,
        open_target: Option<ObjectId>,
    },
    Mailer {
        target: ObjectId,
        subject: String,
        text: String,
    },
}

impl ChannelRequest {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelRequest::InApp { .. } => ChannelKind::InApp,
            ChannelRequest::Push { .. } => ChannelKind::Push,
            ChannelRequest::Post { .. } => ChannelKind::Post,
            ChannelRequest::Mailer { .. } => ChannelKind::Mailer,
        }
    }

    /// Companion instance delivering the message
    pub fn target(&self) -> ObjectId {
        match self {
            ChannelRequest::InApp { target, .. }
            | ChannelRequest::Push { target, .. }
            | ChannelRequest::Post { target, .. }
            | ChannelRequest::Mailer { target, .. } => *target,
        }
    }

    /// Title, or subject for e-mail
    pub fn title(&self) -> &str {
        match self {
            ChannelRequest::InApp { title, .. }
            | ChannelRequest::Push { title, .. }
            | ChannelRequest::Post { title, .. } => title,
            ChannelRequest::Mailer { subject, .. } => subject,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            ChannelRequest::InApp { text, .. }
            | ChannelRequest::Push { text, .. }
            | ChannelRequest::Post { text, .. }
            | ChannelRequest::Mailer { text, .. } => text,
        }
    }
}

/// Errors reported by a channel sender
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("target instance {0} is not available")]
    TargetUnavailable(ObjectId),

    #[error("{kind} channel rejected the message: {reason}")]
    Rejected { kind: ChannelKind, reason: String },
}

/// Delivers rendered requests to the companion instances
///
/// Delivery is fire-and-forget from the dispatcher's point of view: an error
/// is logged and the remaining rows are still sent.
pub trait ChannelSender: Send + Sync {
    /// Sender name (for logging)
    fn name(&self) -> &str;

    fn send(&self, request: &ChannelRequest) -> Result<(), ChannelError>;
}
