//! # syndex-client
//!
//! Subscriber side of a remote syndex master.
//!
//! A [`RemoteSubscriber`] keeps its own checkpoints (in memory or in a JSON
//! file) and asks the master for every id changed above them:
//!
//! ```rust,no_run
//! use syndex_client::RemoteSubscriber;
//!
//! # async fn run() -> syndex_client::Result<()> {
//! let subscriber = RemoteSubscriber::new("http://127.0.0.1:3000", "app1")?;
//! let changes = subscriber.sync("Order").await?;
//! for id in &changes.ids {
//!     println!("{id} changed");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The master keeps no state for such a subscriber; to start over, flush the
//! local checkpoints with [`RemoteSubscriber::flush`].

pub mod error;
pub mod subscriber;

pub use error::{ClientError, Result};
pub use subscriber::RemoteSubscriber;
