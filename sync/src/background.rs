//! Background sync trigger.
//!
//! The trigger never touches the queue. When the platform's background
//! facility fires a registered tag, it sends a [`SyncMessage`] to the
//! foreground [`crate::listener::SyncListener`], which holds the session and
//! performs the drain. Without a background facility (interval `0`), syncing
//! only happens in the foreground.

use dashmap::DashSet;
use dompet_engine::UserId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Tag registered for draining the pending queue.
pub const SYNC_PENDING_TAG: &str = "sync-pending-transactions";

/// Messages sent to the foreground listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncMessage {
    /// The background facility fired a registered tag
    Background { tag: String },
    /// The facade queued a write
    #[serde(rename_all = "camelCase")]
    LocalWrite { user_id: UserId },
    /// The user asked to sync now
    Manual,
}

pub type SyncSender = mpsc::UnboundedSender<SyncMessage>;
pub type SyncReceiver = mpsc::UnboundedReceiver<SyncMessage>;

/// Channel between triggers and the foreground listener.
pub fn sync_channel() -> (SyncSender, SyncReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug)]
pub struct BackgroundSync {
    tags: DashSet<String>,
    foreground: SyncSender,
}

impl BackgroundSync {
    pub fn new(foreground: SyncSender) -> Self {
        Self {
            tags: DashSet::new(),
            foreground,
        }
    }

    /// Register interest in a tag. Returns `false` if already registered.
    pub fn register(&self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        tracing::debug!(%tag, "Background sync registered");
        self.tags.insert(tag)
    }

    pub fn unregister(&self, tag: &str) -> bool {
        self.tags.remove(tag).is_some()
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<_> = self.tags.iter().map(|tag| tag.key().clone()).collect();
        tags.sort();
        tags
    }

    /// Invoked by the platform when `tag` fires. Unregistered tags are ignored.
    /// Returns whether the foreground was notified.
    pub fn fire(&self, tag: &str) -> bool {
        if !self.tags.contains(tag) {
            tracing::debug!(%tag, "Ignoring unregistered background tag");
            return false;
        }
        self.foreground
            .send(SyncMessage::Background {
                tag: tag.to_string(),
            })
            .is_ok()
    }

    /// Fire every registered tag. Returns how many reached the foreground.
    pub fn fire_all(&self) -> usize {
        self.tags()
            .iter()
            .filter(|tag| self.fire(tag.as_str()))
            .count()
    }

    /// Periodic stand-in for the platform facility. `None` when `interval`
    /// is zero (no background facility).
    pub fn spawn_scheduler(self: &Arc<Self>, interval: Duration) -> Option<JoinHandle<()>> {
        if interval.is_zero() {
            tracing::info!("Background sync disabled, foreground sync only");
            return None;
        }

        let trigger = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; startup sync is the listener's job
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(trigger) = trigger.upgrade() else {
                    break;
                };
                if trigger.fire_all() == 0 && trigger.foreground.is_closed() {
                    break;
                }
            }
            tracing::debug!("Background sync scheduler stopped");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_registered_tag() {
        let (tx, mut rx) = sync_channel();
        let trigger = BackgroundSync::new(tx);

        assert!(trigger.register(SYNC_PENDING_TAG));
        assert!(!trigger.register(SYNC_PENDING_TAG));

        assert!(trigger.fire(SYNC_PENDING_TAG));
        assert_eq!(
            rx.try_recv().unwrap(),
            SyncMessage::Background {
                tag: SYNC_PENDING_TAG.to_string()
            }
        );
    }

    #[test]
    fn unregistered_tags_are_ignored() {
        let (tx, mut rx) = sync_channel();
        let trigger = BackgroundSync::new(tx);

        assert!(!trigger.fire("other"));
        trigger.register("a");
        assert!(trigger.unregister("a"));
        assert!(!trigger.fire("a"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn tags_are_sorted() {
        let (tx, _rx) = sync_channel();
        let trigger = BackgroundSync::new(tx);
        trigger.register("b");
        trigger.register("a");
        assert_eq!(trigger.tags(), vec!["a", "b"]);
        assert_eq!(trigger.fire_all(), 2);
    }

    #[tokio::test]
    async fn zero_interval_disables_scheduler() {
        let (tx, _rx) = sync_channel();
        let trigger = Arc::new(BackgroundSync::new(tx));
        assert!(trigger.spawn_scheduler(Duration::ZERO).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_fires_periodically() {
        let (tx, mut rx) = sync_channel();
        let trigger = Arc::new(BackgroundSync::new(tx));
        trigger.register(SYNC_PENDING_TAG);

        let handle = trigger.spawn_scheduler(Duration::from_secs(60)).unwrap();

        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, SyncMessage::Background { .. }));
        handle.abort();
    }

    #[test]
    fn message_serialization() {
        let json = serde_json::to_string(&SyncMessage::LocalWrite {
            user_id: "user-1".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"local_write","userId":"user-1"}"#);
    }
}
