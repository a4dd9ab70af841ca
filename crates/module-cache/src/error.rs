//! Error types for module-cache

use thiserror::Error;

/// Errors from the key/value store behind the module cache.
///
/// These never escape [`crate::RemoteModuleCache`]; the cache logs and
/// treats them as a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The store answered with an error payload
    #[error("cache backend error: {0}")]
    Backend(String),

    /// Transport failure or non-success status
    #[error("cache HTTP error: {0}")]
    Http(String),

    /// A cached record could not be encoded or decoded
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store did not answer in time
    #[error("cache operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        CacheError::Http(err.to_string())
    }
}

/// Errors fetching a remote module.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport failure
    #[error("failed to fetch {specifier}: {message}")]
    Http { specifier: String, message: String },

    /// The server answered with a non-success status
    #[error("failed to fetch {specifier}: HTTP {status}")]
    Status { specifier: String, status: u16 },

    /// The server did not answer in time
    #[error("fetching {specifier} timed out after {timeout:?}")]
    Timeout {
        specifier: String,
        timeout: std::time::Duration,
    },

    /// The specifier's scheme cannot be fetched
    #[error("unsupported module specifier: {0}")]
    Unsupported(String),
}

/// Result type for key/value store operations
pub type Result<T> = std::result::Result<T, CacheError>;
