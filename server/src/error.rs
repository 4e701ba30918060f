//! Unified error handling for the server.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use syndex_engine::Error as LedgerError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Ledger(#[from] LedgerError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl AppError {
    /// Status code and client-facing body. Backend details never leave the server.
    pub fn parts(&self) -> (StatusCode, ErrorResponse) {
        match self {
            AppError::Ledger(e) => {
                let status = match e {
                    LedgerError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                    LedgerError::UnknownType(_) | LedgerError::NotFound { .. } => {
                        StatusCode::NOT_FOUND
                    }
                    LedgerError::AlreadyExists(_)
                    | LedgerError::DuplicateId { .. }
                    | LedgerError::RewindRejected { .. } => StatusCode::CONFLICT,
                    LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let error = match e {
                    LedgerError::Store(_) => "Store error".to_string(),
                    other => other.to_string(),
                };
                (
                    status,
                    ErrorResponse {
                        error,
                        code: e.code(),
                    },
                )
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "Internal server error".to_string(),
                    code: "internal",
                },
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.parts();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!(code = body.code, "Request rejected: {}", self);
        }

        (status, Json(body)).into_response()
    }
}

/// Malformed request bodies are invalid arguments like any other bad input.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Ledger(LedgerError::InvalidArgument(rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Ledger(LedgerError::InvalidArgument(rejection.body_text()))
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
