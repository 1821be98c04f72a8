//! Notification dispatcher - renders channel rows and routes them to the sender

use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use wm_config::{
    ChannelLists, ChannelRow, InAppNotification, MailerNotification, PostNotification,
    PushNotification,
};
use wm_core::{Classification, ObjectId};
use wm_object_space::ObjectSpace;

use crate::channel::{ChannelRequest, ChannelSender};
use crate::template::{render_body, truncate_chars, with_timestamp, MAX_BODY_CHARS, MAX_TITLE_CHARS};

/// Per-dispatch inputs that are not part of the channel configuration
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext {
    /// The module's Active switch
    pub active: bool,
    /// Time used for timestamp suffixes
    pub now: DateTime<Local>,
}

impl DispatchContext {
    pub fn new(active: bool) -> Self {
        Self {
            active,
            now: Local::now(),
        }
    }

    pub fn with_time(mut self, now: DateTime<Local>) -> Self {
        self.now = now;
        self
    }
}

/// Outcome counters of one dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    /// Disabled rows and rows without an existing target
    pub skipped: usize,
    /// The whole dispatch was suppressed by the Active switch
    pub suppressed: bool,
}

impl DispatchReport {
    /// Number of sender invocations
    pub fn attempted(&self) -> usize {
        self.sent + self.failed
    }
}

/// Sends one transition to every actionable row of the four channel lists
pub struct NotificationDispatcher {
    objects: Arc<dyn ObjectSpace>,
    sender: Arc<dyn ChannelSender>,
}

impl NotificationDispatcher {
    pub fn new(objects: Arc<dyn ObjectSpace>, sender: Arc<dyn ChannelSender>) -> Self {
        Self { objects, sender }
    }

    /// Sender name
    pub fn sender_name(&self) -> &str {
        self.sender.name()
    }

    /// Notify every actionable row of `channels` about `display_name` moving to `direction`
    #[instrument(skip(self, channels, ctx), fields(sender = self.sender.name()))]
    pub fn dispatch(
        &self,
        direction: Classification,
        display_name: &str,
        channels: ChannelLists<'_>,
        ctx: &DispatchContext,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        if !ctx.active {
            debug!("Module inactive, notifications suppressed");
            report.suppressed = true;
            return report;
        }

        let (requests, skipped) = self.render(display_name, channels, &ctx.now);
        report.skipped = skipped;

        for request in &requests {
            match self.sender.send(request) {
                Ok(()) => {
                    debug!(kind = %request.kind(), target = %request.target(), "Notification sent");
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(
                        kind = %request.kind(),
                        target = %request.target(),
                        error = %e,
                        "Channel send failed"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Render the requests for every actionable row, plus the number of skipped rows
    pub fn render(
        &self,
        display_name: &str,
        channels: ChannelLists<'_>,
        now: &DateTime<Local>,
    ) -> (Vec<ChannelRequest>, usize) {
        let exists = |id: ObjectId| self.objects.object_exists(id);
        let mut requests = Vec::with_capacity(channels.len());
        let mut skipped = 0;

        for row in channels.in_app {
            match row.target.filter(|_| row.is_actionable(exists)) {
                Some(target) => requests.push(in_app_request(row, target, display_name, now)),
                None => skipped += 1,
            }
        }
        for row in channels.push {
            match row.target.filter(|_| row.is_actionable(exists)) {
                Some(target) => requests.push(push_request(row, target, display_name, now)),
                None => skipped += 1,
            }
        }
        for row in channels.post {
            match row.target.filter(|_| row.is_actionable(exists)) {
                Some(target) => requests.push(post_request(row, target, display_name, now)),
                None => skipped += 1,
            }
        }
        for row in channels.mailer {
            match row.target.filter(|_| row.is_actionable(exists)) {
                Some(target) => requests.push(mailer_request(row, target, display_name, now)),
                None => skipped += 1,
            }
        }

        (requests, skipped)
    }
}

fn in_app_request(
    row: &InAppNotification,
    target: ObjectId,
    name: &str,
    now: &DateTime<Local>,
) -> ChannelRequest {
    ChannelRequest::InApp {
        target,
        title: truncate_chars(&row.title, MAX_TITLE_CHARS),
        text: with_timestamp(render_body(&row.text, name), row.use_timestamp, now),
        icon: row.icon.clone(),
        display_duration: row.display_duration,
    }
}

fn push_request(
    row: &PushNotification,
    target: ObjectId,
    name: &str,
    now: &DateTime<Local>,
) -> ChannelRequest {
    // the push body starts on its own line below the title
    let body = format!("\n{}", render_body(&row.text, name));
    let text = with_timestamp(body, row.use_timestamp, now);
    ChannelRequest::Push {
        target,
        title: truncate_chars(&row.title, MAX_TITLE_CHARS),
        text: truncate_chars(&text, MAX_BODY_CHARS),
        sound: row.sound.clone(),
        open_target: row.open_target,
    }
}

fn post_request(
    row: &PostNotification,
    target: ObjectId,
    name: &str,
    now: &DateTime<Local>,
) -> ChannelRequest {
    let text = with_timestamp(render_body(&row.text, name), row.use_timestamp, now);
    ChannelRequest::Post {
        target,
        title: truncate_chars(&row.title, MAX_TITLE_CHARS),
        text: truncate_chars(&text, MAX_BODY_CHARS),
        icon: row.icon.clone(),
        sound: row.sound.clone(),
        open_target: row.open_target,
    }
}

fn mailer_request(
    row: &MailerNotification,
    target: ObjectId,
    name: &str,
    now: &DateTime<Local>,
) -> ChannelRequest {
    ChannelRequest::Mailer {
        target,
        subject: row.subject.clone(),
        text: with_timestamp(render_body(&row.text, name), row.use_timestamp, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelError, ChannelKind};
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use wm_object_space::{HostObject, MemoryObjectSpace};

    /// Records requests and fails for one configured target
    struct MockSender {
        send_count: AtomicUsize,
        sent: Mutex<Vec<ChannelRequest>>,
        failing_target: Option<ObjectId>,
    }

    impl MockSender {
        fn new() -> Self {
            Self {
                send_count: AtomicUsize::new(0),
                sent: Mutex::new(Vec::new()),
                failing_target: None,
            }
        }

        fn failing_for(target: ObjectId) -> Self {
            Self {
                failing_target: Some(target),
                ..Self::new()
            }
        }

        fn get_send_count(&self) -> usize {
            self.send_count.load(Ordering::SeqCst)
        }

        fn sent(&self) -> Vec<ChannelRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl ChannelSender for MockSender {
        fn name(&self) -> &str {
            "mock"
        }

        fn send(&self, request: &ChannelRequest) -> Result<(), ChannelError> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if Some(request.target()) == self.failing_target {
                return Err(ChannelError::TargetUnavailable(request.target()));
            }
            self.sent.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    fn id(raw: i64) -> ObjectId {
        ObjectId::new(raw).unwrap()
    }

    fn objects(targets: &[i64]) -> Arc<MemoryObjectSpace> {
        let space = MemoryObjectSpace::new();
        for raw in targets {
            space.insert(HostObject::instance(id(*raw), format!("Instance {}", raw)));
        }
        Arc::new(space)
    }

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap()
    }

    fn in_app(target: i64, text: &str) -> InAppNotification {
        serde_json::from_value(json!({
            "ID": target, "Title": "Warnmelder", "Text": text, "Icon": "Warning"
        }))
        .unwrap()
    }

    #[test]
    fn test_in_app_send() {
        let sender = Arc::new(MockSender::new());
        let dispatcher = NotificationDispatcher::new(objects(&[20000]), sender.clone());
        let rows = vec![in_app(20000, "%s triggered!")];
        let channels = ChannelLists {
            in_app: &rows,
            ..Default::default()
        };

        let report = dispatcher.dispatch(
            Classification::Alarm,
            "Smoke A",
            channels,
            &DispatchContext::new(true),
        );

        assert_eq!(report.sent, 1);
        assert_eq!(
            sender.sent(),
            vec![ChannelRequest::InApp {
                target: id(20000),
                title: "Warnmelder".to_string(),
                text: "Smoke A triggered!".to_string(),
                icon: "Warning".to_string(),
                display_duration: 0,
            }]
        );
    }

    #[test]
    fn test_inactive_sends_nothing() {
        let sender = Arc::new(MockSender::new());
        let dispatcher = NotificationDispatcher::new(objects(&[20000]), sender.clone());
        let rows = vec![in_app(20000, "%s triggered!")];
        let channels = ChannelLists {
            in_app: &rows,
            ..Default::default()
        };

        let report = dispatcher.dispatch(
            Classification::Alarm,
            "Smoke A",
            channels,
            &DispatchContext::new(false),
        );

        assert!(report.suppressed);
        assert_eq!(report.attempted(), 0);
        assert_eq!(sender.get_send_count(), 0);
    }

    #[test]
    fn test_rows_without_valid_target_skipped() {
        let sender = Arc::new(MockSender::new());
        let dispatcher = NotificationDispatcher::new(objects(&[20000]), sender.clone());
        let mut disabled = in_app(20000, "%s");
        disabled.enabled = false;
        let rows = vec![
            in_app(1, "%s"),     // sentinel
            in_app(30000, "%s"), // missing
            disabled,
            in_app(20000, "%s"),
        ];
        let channels = ChannelLists {
            in_app: &rows,
            ..Default::default()
        };

        let report = dispatcher.dispatch(
            Classification::Ok,
            "Fenster Bad",
            channels,
            &DispatchContext::new(true),
        );

        assert_eq!(report.skipped, 3);
        assert_eq!(report.sent, 1);
        assert_eq!(sender.get_send_count(), 1);
    }

    #[test]
    fn test_failed_send_does_not_stop_dispatch() {
        let sender = Arc::new(MockSender::failing_for(id(20000)));
        let dispatcher = NotificationDispatcher::new(objects(&[20000, 20001]), sender.clone());
        let in_app_rows = vec![in_app(20000, "%s"), in_app(20001, "%s")];
        let mailer_rows: Vec<MailerNotification> = vec![serde_json::from_value(
            json!({"ID": 20001, "Subject": "Warnmelder", "Text": "%s hat ausgelöst"}),
        )
        .unwrap()];
        let channels = ChannelLists {
            in_app: &in_app_rows,
            mailer: &mailer_rows,
            ..Default::default()
        };

        let report = dispatcher.dispatch(
            Classification::Alarm,
            "Smoke A",
            channels,
            &DispatchContext::new(true),
        );

        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 2);
        assert_eq!(sender.get_send_count(), 3);
        let kinds: Vec<_> = sender.sent().iter().map(|r| r.kind()).collect();
        assert_eq!(kinds, vec![ChannelKind::InApp, ChannelKind::Mailer]);
    }

    #[test]
    fn test_push_truncation() {
        let sender = Arc::new(MockSender::new());
        let dispatcher = NotificationDispatcher::new(objects(&[20000]), sender.clone());
        let rows: Vec<PushNotification> = vec![serde_json::from_value(json!({
            "ID": 20000,
            "Title": "Warnmelder im Erdgeschoss, Alarmanlage Haus",
            "Text": format!("%s {}", "x".repeat(300)),
            "UseTimestamp": true,
            "Sound": "alarm"
        }))
        .unwrap()];
        let channels = ChannelLists {
            push: &rows,
            ..Default::default()
        };

        dispatcher.dispatch(
            Classification::Alarm,
            "Smoke A",
            channels,
            &DispatchContext::new(true).with_time(fixed_now()),
        );

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title().chars().count(), 32);
        assert_eq!(sent[0].text().chars().count(), 256);
        assert!(sent[0].text().starts_with("\nSmoke A x"));
    }

    #[test]
    fn test_timestamp_and_mail_untouched() {
        let sender = Arc::new(MockSender::new());
        let dispatcher = NotificationDispatcher::new(objects(&[20000]), sender.clone());
        let long_subject = "S".repeat(40);
        let rows: Vec<MailerNotification> = vec![serde_json::from_value(json!({
            "ID": 20000,
            "Subject": long_subject,
            "Text": "%s ist wieder OK",
            "UseTimestamp": true
        }))
        .unwrap()];
        let channels = ChannelLists {
            mailer: &rows,
            ..Default::default()
        };

        let (requests, skipped) = dispatcher.render("Fenster Bad", channels, &fixed_now());
        assert_eq!(skipped, 0);
        assert_eq!(requests[0].title(), long_subject);
        assert_eq!(
            requests[0].text(),
            "Fenster Bad ist wieder OK 05.03.2024, 07:08:09"
        );
    }
}
