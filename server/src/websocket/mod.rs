//! WebSocket support for real-time notifications.
//!
//! Subscribers connect via WebSocket, receive a `marked` notification after
//! every ledger write and can sync over the same socket instead of polling
//! the HTTP API.

mod manager;
mod protocol;

pub use manager::ConnectionManager;
pub use protocol::*;
