//! Notice board
//!
//! A [`ChannelSender`] that keeps every delivered message in memory, one
//! notice per request. The standalone runtime uses it as its delivery
//! endpoint and logs each notice; tests use it to observe dispatches.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};
use ulid::Ulid;

use crate::channel::{ChannelError, ChannelKind, ChannelRequest, ChannelSender};

/// A delivered message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    /// Unique notice ID
    pub notice_id: String,
    /// Position in delivery order
    pub sequence: u64,
    pub request: ChannelRequest,
    pub created_at: DateTime<Utc>,
}

impl Notice {
    pub fn new(sequence: u64, request: ChannelRequest) -> Self {
        Self {
            notice_id: Ulid::new().to_string(),
            sequence,
            request,
            created_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.request.kind()
    }
}

/// In-memory record of delivered notices
///
/// Thread-safe storage using DashMap.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    notices: DashMap<String, Notice>,
    next_sequence: AtomicU64,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request, returning the new notice ID
    pub fn post(&self, request: ChannelRequest) -> String {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let notice = Notice::new(sequence, request);
        let notice_id = notice.notice_id.clone();
        info!(
            kind = %notice.kind(),
            target = %notice.request.target(),
            title = %notice.request.title(),
            text = %notice.request.text(),
            "Notice posted"
        );
        self.notices.insert(notice_id.clone(), notice);
        notice_id
    }

    /// Remove a notice. Returns true if it existed.
    pub fn dismiss(&self, notice_id: &str) -> bool {
        let removed = self.notices.remove(notice_id).is_some();
        if removed {
            debug!(notice_id, "Dismissed notice");
        }
        removed
    }

    /// Remove all notices, returning how many were removed
    pub fn dismiss_all(&self) -> usize {
        let count = self.notices.len();
        self.notices.clear();
        count
    }

    pub fn get(&self, notice_id: &str) -> Option<Notice> {
        self.notices.get(notice_id).map(|n| n.clone())
    }

    /// All notices in delivery order
    pub fn get_all(&self) -> Vec<Notice> {
        let mut notices: Vec<_> = self.notices.iter().map(|n| n.value().clone()).collect();
        notices.sort_by_key(|n| n.sequence);
        notices
    }

    /// Notices of one channel kind in delivery order
    pub fn by_kind(&self, kind: ChannelKind) -> Vec<Notice> {
        self.get_all()
            .into_iter()
            .filter(|n| n.kind() == kind)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}

impl ChannelSender for NoticeBoard {
    fn name(&self) -> &str {
        "notice_board"
    }

    fn send(&self, request: &ChannelRequest) -> Result<(), ChannelError> {
        self.post(request.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wm_core::ObjectId;

    fn mail(text: &str) -> ChannelRequest {
        ChannelRequest::Mailer {
            target: ObjectId::new(12345).unwrap(),
            subject: "Warnmelder".to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_post_and_get() {
        let board = NoticeBoard::new();
        assert!(board.is_empty());

        let notice_id = board.post(mail("Smoke A triggered!"));
        let notice = board.get(&notice_id).unwrap();
        assert_eq!(notice.request.text(), "Smoke A triggered!");
        assert_eq!(notice.kind(), ChannelKind::Mailer);
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn test_delivery_order() {
        let board = NoticeBoard::new();
        for i in 0..5 {
            board.send(&mail(&format!("message {}", i))).unwrap();
        }
        let texts: Vec<_> = board
            .get_all()
            .iter()
            .map(|n| n.request.text().to_string())
            .collect();
        assert_eq!(texts.len(), 5);
        assert_eq!(texts[0], "message 0");
        assert_eq!(board.by_kind(ChannelKind::Push).len(), 0);
    }

    #[test]
    fn test_dismiss() {
        let board = NoticeBoard::new();
        let notice_id = board.post(mail("a"));
        board.post(mail("b"));

        assert!(board.dismiss(&notice_id));
        assert!(!board.dismiss(&notice_id));
        assert_eq!(board.dismiss_all(), 1);
        assert!(board.is_empty());
    }
}
