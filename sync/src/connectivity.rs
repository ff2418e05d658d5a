//! Connectivity monitor.
//!
//! A single observable online/offline flag. The platform's reachability
//! signal (or the TCP probe below) feeds it through
//! [`ConnectivityMonitor::set_online`]; consumers subscribe explicitly and see
//! each transition once. The monitor never checks that the remote store is
//! actually reachable: a false "online" surfaces as a transient failure in
//! the sync engine.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        Self { state }
    }

    pub fn new_shared(online: bool) -> Arc<Self> {
        Arc::new(Self::new(online))
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Feed the platform signal. Returns whether this was a transition;
    /// repeating the current value notifies nobody.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            if online {
                tracing::info!("Connectivity restored");
            } else {
                tracing::info!("Connectivity lost");
            }
        }
        changed
    }

    /// Receive every transition from now on.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Periodically probe `addr` over TCP and feed the result into the
    /// monitor. Stops when the monitor is dropped.
    pub fn spawn_probe(
        self: &Arc<Self>,
        addr: String,
        interval: Duration,
        timeout: Duration,
    ) -> JoinHandle<()> {
        let monitor = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = probe(&addr, timeout).await;
                let Some(monitor) = monitor.upgrade() else {
                    break;
                };
                monitor.set_online(reachable);
            }
            tracing::debug!(%addr, "Connectivity probe stopped");
        })
    }
}

/// Whether a TCP connection to `addr` opens within `timeout`.
pub async fn probe(addr: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::trace!(%addr, error = %e, "Probe failed");
            false
        }
        Err(_) => {
            tracing::trace!(%addr, "Probe timed out");
            false
        }
    }
}

/// `host:port` to probe for a remote store URL.
pub fn probe_address(remote_url: &str) -> Option<String> {
    let url = reqwest::Url::parse(remote_url).ok()?;
    let host = url.host_str()?;
    let port = url.port_or_known_default()?;
    Some(format!("{}:{}", host, port))
}
