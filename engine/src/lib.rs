//! # Dompet Engine
//!
//! Pure queue logic for Dompet's offline-first write path.
//!
//! Writes made while the remote document store is unreachable become
//! [`PendingOperation`]s held in a per-user queue. This crate decides
//! everything about that queue that does not need IO: validation, delete
//! supersession, status transitions, drain decisions and retry back-off.
//! The `dompet-sync` crate wraps it with durable storage and networking.
//!
//! ## Design Principles
//!
//! - **No IO**: no files, network or clocks; timestamps are passed in
//! - **Deterministic**: the same queue and outcomes give the same decisions
//! - **Shared**: the in-memory queue, the SQLite queue and the server all use
//!   the same rules
//!
//! ## Core Concepts
//!
//! ### Operations
//!
//! A [`PendingOperation`] is a create, update or delete of one transaction
//! document (expense, income or installment). Its status moves
//! `pending -> syncing -> {pending, removed}`, or to `failed` when the remote
//! store refuses it.
//!
//! ### Supersession
//!
//! [`plan_enqueue`] makes a delete cancel earlier pending or failed writes on
//! the same target. Deleting a document that was only ever created locally,
//! and never sent, cancels both.
//!
//! ### Draining
//!
//! [`DrainCursor`] walks a queue snapshot: success removes, a transient
//! failure stops the drain, a permanent failure marks the operation failed and
//! blocks later operations on the same target.
//!
//! ## Quick Start
//!
//! ```rust
//! use dompet_engine::{EntityType, EnqueueOutcome, PendingOperation, PendingQueue, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::finance();
//! let mut queue = PendingQueue::new();
//!
//! let op = PendingOperation::create(
//!     "op-1",
//!     "user-1",
//!     EntityType::Expense,
//!     "exp-1",
//!     json!({"description": "Kopi", "amount": 25000}),
//!     1706745600000,
//! );
//! schema.validate_operation(&op).unwrap();
//!
//! let outcome = queue.enqueue(op);
//! assert!(matches!(outcome, EnqueueOutcome::Queued { .. }));
//! assert_eq!(queue.count("user-1"), 1);
//!
//! // Deleting the locally created expense cancels the create
//! let delete = PendingOperation::delete("op-2", "user-1", EntityType::Expense, "exp-1", 1706745601000);
//! assert!(matches!(queue.enqueue(delete), EnqueueOutcome::Superseded { .. }));
//! assert_eq!(queue.count("user-1"), 0);
//! ```
//!
//! ## Persistence
//!
//! [`encode_operation`] and [`decode_operation`] define the versioned JSON
//! form durable stores keep on disk.

pub mod error;
pub mod operation;
pub mod persist;
pub mod queue;
pub mod reconcile;
pub mod retry;
pub mod schema;

// Re-export main types at crate root
pub use error::Error;
pub use operation::{EntityType, OperationKind, OperationStatus, PendingOperation, TargetKey};
pub use persist::{decode_operation, encode_operation, PERSIST_FORMAT_VERSION};
pub use queue::{EnqueueOutcome, PendingQueue};
pub use reconcile::{
    plan_enqueue, Admission, Disposition, DrainCursor, DrainReport, EnqueuePlan, FailedOperation,
    FailureClass, Outcome,
};
pub use retry::RetryPolicy;
pub use schema::{EntitySchema, FieldDef, FieldType, Schema};

/// Type aliases for clarity
pub type UserId = String;
pub type OperationId = String;
pub type TargetId = String;
pub type Timestamp = u64;
pub type Sequence = u64;
pub type FormatVersion = u32;
