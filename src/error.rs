//! Error taxonomy for the ingestion pipeline.
//!
//! Fetch and store failures end an invocation; normalization failures only
//! drop the offending record. Application plumbing (config loading, CLI,
//! server bootstrap) uses `anyhow` instead.

use thiserror::Error;

/// A page request to the remote search endpoint failed.
///
/// Aborts the remaining pages of the current invocation.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for page {page} timed out")]
    Timeout { page: u32 },

    #[error("page {page} returned HTTP {status}")]
    Status { page: u32, status: u16 },

    #[error("request for page {page} failed: {source}")]
    Transport {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("page {page} returned an unreadable body: {message}")]
    Decode { page: u32, message: String },
}

impl FetchError {
    /// Page number the failed request was for.
    pub fn page(&self) -> u32 {
        match self {
            FetchError::Timeout { page }
            | FetchError::Status { page, .. }
            | FetchError::Transport { page, .. }
            | FetchError::Decode { page, .. } => *page,
        }
    }
}

/// A single remote record could not be mapped into a product.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizationError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` must not be negative (got {value})")]
    Negative { field: &'static str, value: i64 },

    #[error("field `{field}` must be between 0 and 5 (got {value})")]
    OutOfRange { field: &'static str, value: f64 },
}

/// A bulk read or write against the product store failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Backend(String),
}

/// Terminal failure of one ingestion invocation.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
