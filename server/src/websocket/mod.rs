//! WebSocket support for realtime document updates.
//!
//! A client connects to `/v1/users/{userId}/realtime`, sends `listen` for
//! each collection it displays, receives a snapshot of that collection and
//! then a `changed` message for every write to it.

mod manager;
mod protocol;

pub use manager::ConnectionManager;
pub use protocol::*;
