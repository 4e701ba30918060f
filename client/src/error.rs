//! Errors of the remote subscriber.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Local validation or checkpoint storage failed
    #[error(transparent)]
    Ledger(#[from] syndex_engine::Error),

    #[error("request to master failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid master url: {0}")]
    InvalidUrl(String),

    /// The master answered with an error body
    #[error("master rejected request ({status}, {code}): {message}")]
    Remote {
        status: u16,
        code: String,
        message: String,
    },

    #[error("checkpoint task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
