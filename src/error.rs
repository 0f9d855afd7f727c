//! Error types for the inventory engine.

use thiserror::Error;

use crate::response::FetchFailure;

/// Result type alias using the motorcade error type.
pub type Result<T> = std::result::Result<T, MotorcadeError>;

/// Main error type for the inventory engine.
///
/// Per-call transport failures are not errors at this level: they travel
/// inside [`FetchResult`](crate::response::FetchResult) so one bad page never
/// aborts a batch. This enum is for operation-fatal conditions only.
#[derive(Error, Debug)]
pub enum MotorcadeError {
    /// Transport configuration was rejected (bad origin, client build failure)
    #[error("Invalid transport configuration: {0}")]
    Config(String),

    /// An upstream call the whole operation depends on failed
    #[error("Upstream request failed: {0}")]
    Upstream(FetchFailure),

    /// Upstream body decoded but could not be interpreted
    #[error("Malformed upstream payload: {0}")]
    Malformed(String),

    /// The upstream cannot serve this query shape
    #[error("Unsupported query: {0}")]
    Unsupported(String),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MotorcadeError {
    /// The classified transport failure behind this error, when there is one.
    pub fn fetch_failure(&self) -> Option<&FetchFailure> {
        match self {
            MotorcadeError::Upstream(failure) => Some(failure),
            _ => None,
        }
    }
}
