//! Error taxonomy for applet builds.

use applet_schema::ExtractError;
use applet_store::StorageError;

/// Errors produced while hashing, building or publishing an applet.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A specifier could not be resolved or loaded. Always fatal to the build.
    #[error("failed to load {specifier}: {message}")]
    Load { specifier: String, message: String },

    #[error("schema extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Two scripts sanitize to the same bundled filename
    #[error("scripts {first:?} and {second:?} both bundle as {filename:?}")]
    ScriptCollision {
        first: String,
        second: String,
        filename: String,
    },

    #[error("invalid build configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A background load or upload task panicked or was cancelled
    #[error("build task failed: {0}")]
    Join(String),
}

impl BuildError {
    pub fn load(specifier: impl Into<String>, message: impl Into<String>) -> Self {
        BuildError::Load {
            specifier: specifier.into(),
            message: message.into(),
        }
    }
}

impl From<tokio::task::JoinError> for BuildError {
    fn from(err: tokio::task::JoinError) -> Self {
        BuildError::Join(err.to_string())
    }
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;
