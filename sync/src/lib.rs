//! # Dompet Sync
//!
//! Offline-first write path for Dompet: transaction writes succeed while the
//! device is offline, are kept in a durable pending queue, and are replayed
//! against the remote document store in enqueue order once connectivity
//! returns.
//!
//! ## Pieces
//!
//! - [`ConnectivityMonitor`]: observable online/offline flag
//! - [`PendingStore`]: durable per-user queue ([`SqliteStore`], [`MemoryStore`])
//! - [`SyncEngine`]: single-flight drain of one user's queue
//! - [`BackgroundSync`] and [`SyncListener`]: who decides when to drain
//! - [`TransactionFacade`]: the write API used by the application
//!
//! ## Example
//!
//! ```no_run
//! use dompet_sync::{
//!     ConnectivityMonitor, InMemoryRemote, MemoryStore, PendingBadge, TracingNotifier,
//!     TransactionFacade,
//! };
//! use dompet_engine::EntityType;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), dompet_sync::SyncError> {
//! let facade = TransactionFacade::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(InMemoryRemote::new()),
//!     ConnectivityMonitor::new_shared(false),
//!     PendingBadge::new_shared(),
//!     Arc::new(TracingNotifier),
//! );
//!
//! let receipt = facade
//!     .add_transaction("user-1", EntityType::Expense, json!({"description": "Kopi", "amount": 25000}))
//!     .await?;
//! assert_eq!(receipt.pending_count, 1);
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod badge;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod facade;
pub mod listener;
pub mod notify;
pub mod remote;
pub mod session;
pub mod store;

pub use background::{sync_channel, BackgroundSync, SyncMessage, SyncReceiver, SyncSender, SYNC_PENDING_TAG};
pub use badge::PendingBadge;
pub use config::{AgentConfig, ConfigError};
pub use connectivity::ConnectivityMonitor;
pub use engine::{SyncEngine, SyncOutcome};
pub use error::{Result, StorageError, SyncError};
pub use facade::{Delivery, TransactionFacade, WritePolicy, WriteReceipt};
pub use listener::SyncListener;
pub use notify::{ChannelNotifier, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use remote::{HttpRemote, InMemoryRemote, RemoteCall, RemoteError, RemoteStore};
pub use session::Session;
pub use store::{MemoryStore, PendingStore, SqliteStore, UnavailableStore};
