//! Transient user-facing notifications (toasts).

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Notifications {
    sender: broadcast::Sender<Notification>,
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifications {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(NotificationKind::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(NotificationKind::Error, message.into());
    }

    fn publish(&self, kind: NotificationKind, message: String) {
        debug!("Notification ({}): {}", kind, message);
        // Nobody watching is fine, toasts are fire-and-forget
        let _ = self.sender.send(Notification { kind, message });
    }
}
