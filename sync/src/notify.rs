//! User notifications (toasts).

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A dismissible message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn went_offline() -> Self {
        Self::new(
            NoticeLevel::Warning,
            "You are offline. Changes will be saved and synced later.",
        )
    }

    pub fn back_online() -> Self {
        Self::new(NoticeLevel::Info, "Back online. Syncing pending changes.")
    }

    pub fn synced(count: usize) -> Self {
        let noun = if count == 1 { "change" } else { "changes" };
        Self::new(NoticeLevel::Success, format!("Synced {} pending {}.", count, noun))
    }

    pub fn sync_failed(reason: &str) -> Self {
        Self::new(
            NoticeLevel::Error,
            format!("A pending change was rejected: {}", reason),
        )
    }

    pub fn sync_interrupted() -> Self {
        Self::new(
            NoticeLevel::Warning,
            "Sync paused. Pending changes will be retried.",
        )
    }

    pub fn buffering_unavailable(reason: &str) -> Self {
        Self::new(
            NoticeLevel::Warning,
            format!(
                "Offline saving is unavailable ({}). Changes need a connection.",
                reason
            ),
        )
    }
}

/// Receives notices for display.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::info!(level = ?notice.level, "{}", notice.message)
            }
            NoticeLevel::Warning => tracing::warn!("{}", notice.message),
            NoticeLevel::Error => tracing::error!("{}", notice.message),
        }
    }
}

/// Forwards notices to a UI over a channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        // Nobody listening is fine; notices are best effort
        let _ = self.sender.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_notifier_forwards() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        notifier.notify(Notice::synced(2));

        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Success);
        assert_eq!(notice.message, "Synced 2 pending changes.");
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);
        notifier.notify(Notice::went_offline());
    }

    #[test]
    fn notice_serialization() {
        let json = serde_json::to_string(&Notice::synced(1)).unwrap();
        assert_eq!(
            json,
            r#"{"level":"success","message":"Synced 1 pending change."}"#
        );
    }
}
