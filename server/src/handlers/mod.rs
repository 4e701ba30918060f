//! Request handlers for the master and subscriber sides.
//!
//! The ledger is synchronous and the JSON backend writes files, so every
//! ledger call runs on the blocking pool.

mod master;
mod subscriber;
mod websocket;

pub use master::*;
pub use subscriber::*;
pub use websocket::*;

use crate::error::{AppError, Result};

/// Run a ledger call on the blocking thread pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> syndex_engine::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(AppError::from)
}
