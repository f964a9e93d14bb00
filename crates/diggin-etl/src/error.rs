//! Ingestion error types.

use diggin_search::StoreError;
use thiserror::Error;

/// Errors that can occur while ingesting albums.
///
/// Each variant belongs to one containment level: transport and parse
/// failures degrade to "no data" for the current tag or album, embedding
/// failures skip a single album, store failures abort the sweep, and a
/// missing configuration value stops the process from starting.
#[derive(Debug, Error)]
pub enum IngestError {
    /// An HTTP request to an external source failed.
    #[error("HTTP error from {source_name}: {message}")]
    Transport {
        source_name: String,
        message: String,
    },

    /// The external source returned a rate-limit response.
    #[error("rate limited by {source_name}")]
    RateLimited { source_name: String },

    /// A response from an external source could not be parsed.
    #[error("malformed response from {source_name}: {message}")]
    MalformedResponse {
        source_name: String,
        message: String,
    },

    /// The embedding provider could not produce a vector.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Refused to embed an empty description.
    #[error("empty description for {natural_key}")]
    EmptyDescription { natural_key: String },

    /// The vector collection could not be reached or rejected a write.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// A required configuration value is absent.
    #[error("missing configuration: {0}")]
    ConfigurationMissing(&'static str),

    /// An error propagated from `reqwest`.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
}

impl IngestError {
    /// Returns `true` when the error is transient and the operation may
    /// succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::RateLimited { .. } | Self::Request(_) => true,
            Self::StoreUnavailable(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns `true` when the error only concerns the album being
    /// processed and the sweep should move on to the next one.
    pub fn is_item_scoped(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingUnavailable(_)
                | Self::EmptyDescription { .. }
                | Self::StoreUnavailable(StoreError::InvalidRecord(_))
        )
    }
}

/// Convenience alias for ingestion results.
pub type IngestResult<T> = std::result::Result<T, IngestError>;
