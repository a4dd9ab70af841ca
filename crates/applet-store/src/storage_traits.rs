//! Storage trait definitions for applet builds
//!
//! - `BlobStore`: content-addressed artifact storage (put/get by digest)
//! - `VersionStore`: hash-addressed version rows, one per `(app_id, hash)`
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// BlobStore: Content-Addressed Artifacts
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string).
///
/// Always lowercase hex: produced by `from_bytes` or validated via
/// `TryFrom<String>`, including on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl From<ContentDigest> for String {
    fn from(digest: ContentDigest) -> Self {
        digest.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content-addressed blob store for build artifacts.
///
/// Guarantees:
/// - `put(data)` always returns the SHA-256 digest of `data`.
/// - `get(digest)` returns the exact bytes previously stored.
/// - Same content always yields the same digest (deduplication).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return their content digest.
    async fn put(&self, data: &[u8]) -> StorageResult<ContentDigest>;

    /// Retrieve bytes by digest. Returns `StorageError::NotFound` if absent.
    async fn get(&self, digest: &ContentDigest) -> StorageResult<Vec<u8>>;

    async fn contains(&self, digest: &ContentDigest) -> StorageResult<bool>;
}

// ---------------------------------------------------------------------------
// VersionStore: Hash-Addressed Builds
// ---------------------------------------------------------------------------

/// One immutable build of an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub app_id: String,
    /// Full app hash
    pub hash: String,
    /// Short version id (hash prefix)
    pub version: String,
    pub is_published: bool,
    /// Digest of the serialized artifact in the blob store
    pub artifact_digest: ContentDigest,
    pub created_at: DateTime<Utc>,
}

impl VersionRecord {
    pub fn new(
        app_id: impl Into<String>,
        hash: impl Into<String>,
        version: impl Into<String>,
        artifact_digest: ContentDigest,
    ) -> Self {
        VersionRecord {
            app_id: app_id.into(),
            hash: hash.into(),
            version: version.into(),
            is_published: false,
            artifact_digest,
            created_at: Utc::now(),
        }
    }

    pub fn published(mut self) -> Self {
        self.is_published = true;
        self
    }
}

/// Registry of built versions.
///
/// Guarantees:
/// - At most one row exists per `(app_id, hash)`.
/// - `upsert` on an existing key replaces the row instead of duplicating it,
///   so concurrent builds of identical content converge.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Look up the version built from `hash`, if any.
    async fn find(&self, app_id: &str, hash: &str) -> StorageResult<Option<VersionRecord>>;

    /// Create or replace the row keyed by `(record.app_id, record.hash)`.
    async fn upsert(&self, record: VersionRecord) -> StorageResult<VersionRecord>;

    /// All versions of an app, newest first.
    async fn list(&self, app_id: &str) -> StorageResult<Vec<VersionRecord>>;
}
