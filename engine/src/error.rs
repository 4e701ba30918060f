//! Error types for the syndex ledger.

use crate::{Syndex, TypeName};
use thiserror::Error;

/// All possible errors from the ledger engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("{0}")]
    InvalidArgument(String),

    // Lookup errors
    #[error("unknown type: {0}")]
    UnknownType(TypeName),

    #[error("type already exists: {0}")]
    AlreadyExists(TypeName),

    #[error("item not found: {type_name}/{id}")]
    NotFound { type_name: TypeName, id: String },

    // Write errors
    #[error("inserting on duplicate id: {type_name}/{id}")]
    DuplicateId { type_name: TypeName, id: String },

    #[error("cannot set syndex to lower value: current {current}, requested {requested}")]
    RewindRejected { current: Syndex, requested: Syndex },

    // Backend errors
    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    /// Build an `InvalidArgument` for a missing or empty input.
    pub fn required(kind: &str) -> Self {
        Error::InvalidArgument(format!("{kind} is required"))
    }

    /// Stable machine-readable code, used by remote surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "invalid_argument",
            Error::UnknownType(_) => "unknown_type",
            Error::AlreadyExists(_) => "already_exists",
            Error::NotFound { .. } => "not_found",
            Error::DuplicateId { .. } => "duplicate_id",
            Error::RewindRejected { .. } => "rewind_rejected",
            Error::Store(_) => "store_error",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Store(err.to_string())
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;
