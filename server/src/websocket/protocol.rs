//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded with a `type` tag; fields are camelCase.

use serde::{Deserialize, Serialize};

use crate::db::StoredDocument;

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to a collection.
    #[serde(rename_all = "camelCase")]
    Listen {
        collection: String,
        /// Request ID for correlating the snapshot
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Stop receiving changes for a collection.
    Unlisten { collection: String },

    /// Keep-alive ping.
    Ping,
}

/// How a document changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Put,
    Patch,
    Delete,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current contents of a collection, sent in answer to `listen`.
    #[serde(rename_all = "camelCase")]
    Snapshot {
        collection: String,
        documents: Vec<StoredDocument>,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// A document of a listened collection was written.
    #[serde(rename_all = "camelCase")]
    Changed {
        collection: String,
        doc_id: String,
        change: ChangeKind,
        /// New contents; absent for deletes
        #[serde(skip_serializing_if = "Option::is_none")]
        document: Option<StoredDocument>,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    #[serde(rename_all = "camelCase")]
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id,
        }
    }

    /// Change notification for a written document.
    pub fn written(change: ChangeKind, document: StoredDocument) -> Self {
        ServerMessage::Changed {
            collection: document.collection.clone(),
            doc_id: document.doc_id.clone(),
            change,
            document: Some(document),
        }
    }

    pub fn deleted(collection: impl Into<String>, doc_id: impl Into<String>) -> Self {
        ServerMessage::Changed {
            collection: collection.into(),
            doc_id: doc_id.into(),
            change: ChangeKind::Delete,
            document: None,
        }
    }
}
