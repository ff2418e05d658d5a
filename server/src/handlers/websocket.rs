//! Realtime connection loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use dompet_engine::EntityType;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::db;
use crate::websocket::{ClientMessage, ConnectionManager, ServerMessage};

/// One registered realtime client of one user.
struct RealtimeConnection {
    pool: PgPool,
    manager: Arc<ConnectionManager>,
    conn_id: String,
    user_id: String,
}

/// Serve `socket` for `user_id` until either side closes it.
///
/// Outgoing messages (replies and published changes) go through the
/// connection manager's channel, so a single task owns the socket sink.
pub async fn handle_websocket_connection(
    socket: WebSocket,
    pool: PgPool,
    manager: Arc<ConnectionManager>,
    user_id: String,
) {
    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    let conn = RealtimeConnection {
        conn_id: manager.register(user_id.clone(), tx),
        pool,
        manager,
        user_id,
    };
    tracing::info!(conn_id = %conn.conn_id, user_id = %conn.user_id, "Realtime client connected");

    tokio::select! {
        _ = write_loop(sink, rx) => {
            tracing::debug!(conn_id = %conn.conn_id, "Realtime writer stopped");
        }
        _ = conn.read_loop(stream) => {}
    }

    conn.manager.unregister(&conn.conn_id);
    tracing::info!(
        conn_id = %conn.conn_id,
        user_id = %conn.user_id,
        active_connections = conn.manager.connection_count(),
        "Realtime client disconnected"
    );
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(message) = rx.recv().await {
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode realtime message");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text.into())).await {
            tracing::warn!(error = %e, "Failed to send realtime message");
            return;
        }
    }
}

impl RealtimeConnection {
    async fn read_loop(&self, mut stream: SplitStream<WebSocket>) {
        while let Some(frame) = stream.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text.to_string(),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        self.reply(ServerMessage::error("Binary frames must be UTF-8 JSON", None));
                        continue;
                    }
                },
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(_)) => return,
                Err(e) => {
                    tracing::warn!(conn_id = %self.conn_id, error = %e, "Realtime socket error");
                    return;
                }
            };

            let reply = match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => self.handle(message).await,
                Err(e) => Some(ServerMessage::error(format!("Invalid message format: {}", e), None)),
            };
            if let Some(reply) = reply {
                self.reply(reply);
            }
        }
    }

    fn reply(&self, message: ServerMessage) {
        self.manager.send_to(&self.conn_id, message);
    }

    /// Answer a client message. `unlisten` has no reply.
    async fn handle(&self, message: ClientMessage) -> Option<ServerMessage> {
        match message {
            ClientMessage::Listen {
                collection,
                request_id,
            } => Some(self.listen(collection, request_id).await),
            ClientMessage::Unlisten { collection } => {
                self.manager.unlisten(&self.conn_id, &collection);
                None
            }
            ClientMessage::Ping => Some(ServerMessage::Pong),
        }
    }

    async fn listen(&self, collection: String, request_id: Option<String>) -> ServerMessage {
        if let Err(e) = EntityType::from_collection(&collection) {
            return ServerMessage::error(e.to_string(), request_id);
        }

        // Subscribe before reading so no write between the two is missed
        self.manager.listen(&self.conn_id, &collection);

        match db::list_documents(&self.pool, &self.user_id, &collection).await {
            Ok(documents) => ServerMessage::Snapshot {
                collection,
                documents,
                request_id,
            },
            Err(e) => {
                tracing::error!(user_id = %self.user_id, error = ?e, "Snapshot query failed");
                ServerMessage::error("Database error", request_id)
            }
        }
    }
}
