use std::sync::Arc;

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned {status}")]
    Status { status: u16, url: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{label} timed out")]
    Timeout { label: String },
    #[error("unusable payload: {0}")]
    Schema(String),
    #[error("{provider} returned no records")]
    NoRecords { provider: String },
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Shared(#[from] SharedError),
}

impl SyncError {
    /// Whether the same request may succeed if repeated: timeouts, transport
    /// failures, rate limiting and server-side statuses.
    pub fn is_transient(&self) -> bool {
        match self {
            #[cfg(feature = "http")]
            SyncError::Http(_) => true,
            SyncError::Timeout { .. } => true,
            SyncError::Status { status, .. } => *status >= 500 || *status == 429,
            SyncError::Shared(inner) => inner.is_transient(),
            _ => false,
        }
    }
}

/// Error handed to every caller that joined a coalesced request.
pub type SharedError = Arc<SyncError>;
