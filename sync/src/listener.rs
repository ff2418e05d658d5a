//! Foreground sync listener.
//!
//! Holds the session and performs every drain. It reacts to:
//!
//! - connectivity transitions (announce; sync on `offline -> online`)
//! - [`SyncMessage`]s from the background trigger and the facade
//! - sign-in
//! - a retry timer armed after a transient interruption
//!
//! Retries back off exponentially ([`RetryPolicy`]); regaining connectivity
//! syncs immediately and resets the back-off.

use crate::background::{SyncMessage, SyncReceiver};
use crate::connectivity::ConnectivityMonitor;
use crate::engine::{SyncEngine, SyncOutcome};
use crate::notify::{Notice, Notifier};
use crate::session::Session;
use dompet_engine::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub struct SyncListener {
    engine: Arc<SyncEngine>,
    monitor: Arc<ConnectivityMonitor>,
    session: Arc<Session>,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
}

/// Retry state across drains.
#[derive(Debug, Default)]
struct Backoff {
    /// Consecutive interrupted drains
    failures: u32,
    next_attempt: Option<Instant>,
}

impl Backoff {
    fn reset(&mut self) {
        self.failures = 0;
        self.next_attempt = None;
    }
}

impl SyncListener {
    pub fn new(
        engine: Arc<SyncEngine>,
        monitor: Arc<ConnectivityMonitor>,
        session: Arc<Session>,
        notifier: Arc<dyn Notifier>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            engine,
            monitor,
            session,
            notifier,
            retry,
        }
    }

    pub fn spawn(self, messages: SyncReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(messages))
    }

    /// Run until the message channel closes.
    pub async fn run(self, mut messages: SyncReceiver) {
        let mut online_rx = self.monitor.subscribe();
        let mut session_rx = self.session.subscribe();
        let mut online = *online_rx.borrow_and_update();
        session_rx.borrow_and_update();
        let mut backoff = Backoff::default();

        // Catch up on anything queued before this process started
        if online {
            self.sync(&mut backoff, "startup").await;
        }

        loop {
            let retry_at = backoff.next_attempt;
            let retry_timer = async move {
                match retry_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *online_rx.borrow_and_update();
                    if now_online == online {
                        continue;
                    }
                    online = now_online;

                    if online {
                        self.notifier.notify(Notice::back_online());
                        backoff.reset();
                        self.sync(&mut backoff, "connectivity restored").await;
                    } else {
                        self.notifier.notify(Notice::went_offline());
                        backoff.next_attempt = None;
                    }
                }
                changed = session_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let signed_in = session_rx.borrow_and_update().is_some();
                    backoff.reset();
                    if signed_in && online {
                        self.sync(&mut backoff, "signed in").await;
                    }
                }
                message = messages.recv() => {
                    let Some(message) = message else {
                        break;
                    };
                    tracing::debug!(?message, "Sync message received");
                    if let SyncMessage::LocalWrite { user_id } = &message {
                        if self.session.current().as_deref() != Some(user_id.as_str()) {
                            continue;
                        }
                    }
                    if online {
                        self.sync(&mut backoff, "message").await;
                    }
                }
                _ = retry_timer => {
                    backoff.next_attempt = None;
                    if online {
                        self.sync(&mut backoff, "retry").await;
                    }
                }
            }
        }

        tracing::debug!("Sync listener stopped");
    }

    async fn sync(&self, backoff: &mut Backoff, reason: &'static str) {
        let Some(user_id) = self.session.current() else {
            tracing::debug!(reason, "No user signed in, skipping sync");
            return;
        };

        tracing::debug!(user_id = %user_id, reason, "Starting sync");

        match self.engine.sync_pending_data(&user_id).await {
            Ok(SyncOutcome::Completed(report)) if report.is_interrupted() => {
                backoff.failures = backoff.failures.saturating_add(1);
                let delay = Duration::from_millis(self.retry.delay_ms(backoff.failures));
                backoff.next_attempt = Some(Instant::now() + delay);
                tracing::info!(
                    user_id = %user_id,
                    failures = backoff.failures,
                    retry_in_ms = delay.as_millis() as u64,
                    "Sync interrupted, retry scheduled"
                );
            }
            Ok(SyncOutcome::Completed(_)) => backoff.reset(),
            Ok(SyncOutcome::AlreadyRunning) => {}
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Sync failed on local storage");
                self.notifier.notify(Notice::buffering_unavailable(&e.to_string()));
            }
        }
    }
}
