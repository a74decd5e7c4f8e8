//! Error types for linesync core

use thiserror::Error;

/// Core error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid revision {revision}: document is at revision {current}")]
    InvalidRevision { revision: usize, current: usize },

    #[error("Invalid document ID: {0}")]
    InvalidDocumentId(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Internal invariant violation: {0}")]
    InternalInvariantViolation(String),
}

impl Error {
    /// Short machine-readable code, used in protocol error replies
    pub fn code(&self) -> &'static str {
        match self {
            Error::AlreadyExists(_) => "EXISTS",
            Error::NotFound(_) => "NOT_FOUND",
            Error::InvalidRevision { .. } => "INVALID_REVISION",
            Error::InvalidDocumentId(_) => "INVALID_ID",
            Error::InvalidOperation(_) => "INVALID_OPERATION",
            Error::InternalInvariantViolation(_) => "INTERNAL",
        }
    }
}

/// Result type alias for linesync core operations
pub type Result<T> = std::result::Result<T, Error>;
