//! Notification dispatch for the warning detector
//!
//! On every Alarm/OK transition the monitor hands the sensor name and the
//! four channel lists of the direction to [`NotificationDispatcher`]. Each
//! actionable row is rendered into a [`ChannelRequest`] and passed to a
//! [`ChannelSender`]; failures are logged and do not stop the remaining rows.

mod channel;
mod dispatcher;
mod notice_board;
pub mod template;

pub use channel::{ChannelError, ChannelKind, ChannelRequest, ChannelSender};
pub use dispatcher::{DispatchContext, DispatchReport, NotificationDispatcher};
pub use notice_board::{Notice, NoticeBoard};
