//! Typed errors for the import pipeline and its collaborators.

use thiserror::Error;

/// Failure of one source's import run. Always recorded on the source's run
/// status by the orchestrator; never escapes a batch.
#[derive(Debug, Error)]
pub enum ImportError {
    /// A required field is missing from the source configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport failure, timeout or non-2xx response.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The upstream answered, but not in the expected shape.
    #[error("upstream format error: {0}")]
    UpstreamFormat(String),

    /// The content store refused a write.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl ImportError {
    /// Configuration problems need a human; everything else may clear up by the next run.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ImportError::Configuration(_))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("storing media failed: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error reported by an [`crate::http::HttpClient`]. Non-2xx answers are not
/// errors at this level; callers inspect the status.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("request failed: {0}")]
    Transport(String),
}
