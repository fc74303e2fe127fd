// ── User-facing notifications ──
//
// Every failure produces exactly one notification; successes produce at
// most one. Delivery is fire-and-forget over a broadcast channel.

use std::sync::Arc;

use serde::Serialize;
use strum::Display;
use tokio::sync::broadcast;
use tracing::debug;

const NOTIFICATION_CHANNEL_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Sending half of the notification sink, shared by every component.
#[derive(Clone)]
pub(crate) struct Notifier {
    tx: broadcast::Sender<Arc<Notification>>,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_SIZE);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.tx.subscribe()
    }

    pub(crate) fn send(&self, notification: Notification) {
        debug!(
            level = %notification.level,
            title = %notification.title,
            "notification"
        );
        // No subscribers is fine.
        let _ = self.tx.send(Arc::new(notification));
    }

    pub(crate) fn info(&self, title: impl Into<String>, detail: impl Into<String>) {
        self.send(Notification::new(NotificationLevel::Info, title).with_detail(detail));
    }

    pub(crate) fn success(&self, title: impl Into<String>, detail: impl Into<String>) {
        self.send(Notification::new(NotificationLevel::Success, title).with_detail(detail));
    }

    pub(crate) fn warning(&self, title: impl Into<String>, detail: Option<String>) {
        let mut n = Notification::new(NotificationLevel::Warning, title);
        n.detail = detail;
        self.send(n);
    }

    pub(crate) fn error(&self, title: impl Into<String>, detail: impl Into<String>) {
        self.send(Notification::new(NotificationLevel::Error, title).with_detail(detail));
    }
}
