//! The signed-in user, as supplied by the identity provider.

use dompet_engine::UserId;
use std::sync::Arc;
use tokio::sync::watch;

/// Observable current user. The user ID is trusted as given.
#[derive(Debug)]
pub struct Session {
    user: watch::Sender<Option<UserId>>,
}

impl Session {
    pub fn new(user: Option<UserId>) -> Self {
        let (user, _) = watch::channel(user);
        Self { user }
    }

    pub fn new_shared(user: Option<UserId>) -> Arc<Self> {
        Arc::new(Self::new(user))
    }

    pub fn current(&self) -> Option<UserId> {
        self.user.borrow().clone()
    }

    pub fn sign_in(&self, user_id: impl Into<UserId>) {
        let user_id = user_id.into();
        tracing::info!(user_id = %user_id, "Signed in");
        self.user.send_replace(Some(user_id));
    }

    pub fn sign_out(&self) {
        if let Some(user_id) = self.user.send_replace(None) {
            tracing::info!(user_id = %user_id, "Signed out");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UserId>> {
        self.user.subscribe()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(None)
    }
}
