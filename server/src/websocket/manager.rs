//! Tracks realtime connections per user and the collections each one
//! listens to, so a write reaches exactly the connections that display it.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::ServerMessage;

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// A single WebSocket connection.
#[derive(Debug)]
pub struct Connection {
    pub user_id: String,
    /// Collections this connection listens to
    pub collections: HashSet<String>,
    pub sender: MessageSender,
}

/// Manages active WebSocket connections.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    /// All active connections, keyed by connection ID.
    connections: DashMap<String, Connection>,
    /// Connection IDs by user.
    by_user: DashMap<String, HashSet<String>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a connection listening to nothing yet. Returns its ID.
    pub fn register(&self, user_id: String, sender: MessageSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        self.by_user
            .entry(user_id.clone())
            .or_default()
            .insert(conn_id.clone());
        self.connections.insert(
            conn_id.clone(),
            Connection {
                user_id,
                collections: HashSet::new(),
                sender,
            },
        );

        conn_id
    }

    pub fn unregister(&self, conn_id: &str) {
        let Some((_, conn)) = self.connections.remove(conn_id) else {
            return;
        };

        if let Some(mut conn_ids) = self.by_user.get_mut(&conn.user_id) {
            conn_ids.remove(conn_id);
        }
        self.by_user
            .remove_if(&conn.user_id, |_, conn_ids| conn_ids.is_empty());

        tracing::debug!(
            conn_id = %conn_id,
            user_id = %conn.user_id,
            listened = conn.collections.len(),
            "Realtime connection removed"
        );
    }

    /// Start delivering changes of `collection` to the connection.
    pub fn listen(&self, conn_id: &str, collection: &str) -> bool {
        match self.connections.get_mut(conn_id) {
            Some(mut conn) => {
                conn.collections.insert(collection.to_string());
                true
            }
            None => false,
        }
    }

    pub fn unlisten(&self, conn_id: &str, collection: &str) -> bool {
        self.connections
            .get_mut(conn_id)
            .map(|mut conn| conn.collections.remove(collection))
            .unwrap_or(false)
    }

    /// Send a change to every connection of `user_id` listening to `collection`.
    ///
    /// Returns the number of connections that received the message.
    pub fn publish(&self, user_id: &str, collection: &str, message: ServerMessage) -> usize {
        let Some(conn_ids) = self.by_user.get(user_id).map(|ids| ids.clone()) else {
            return 0;
        };

        let sent_count = conn_ids
            .iter()
            .filter_map(|conn_id| self.connections.get(conn_id))
            .filter(|conn| conn.collections.contains(collection))
            .filter(|conn| conn.sender.send(message.clone()).is_ok())
            .count();

        tracing::debug!(
            user_id = %user_id,
            collection = %collection,
            recipients = sent_count,
            "Published document change"
        );

        sent_count
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, conn_id: &str, message: ServerMessage) -> bool {
        match self.connections.get(conn_id) {
            Some(conn) => conn.sender.send(message).is_ok(),
            None => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of distinct users connected.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }
}
