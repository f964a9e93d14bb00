//! Vector store error types.

use thiserror::Error;

/// Errors raised by a [`VectorCollection`](crate::VectorCollection).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached at all.
    #[error("vector store unreachable at {endpoint}: {message}")]
    Unavailable { endpoint: String, message: String },

    /// The store answered with a non-success status.
    #[error("vector store returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The store answered with a body we could not read.
    #[error("unexpected response from vector store: {0}")]
    Malformed(String),

    /// An operation ran before `ensure_collection`.
    #[error("collection {0} does not exist")]
    MissingCollection(String),

    /// The record may not become visible to search.
    #[error(transparent)]
    InvalidRecord(#[from] diggin_core::Error),
}

impl StoreError {
    /// Returns `true` when retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Convenience alias for store results.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
