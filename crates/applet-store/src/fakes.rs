//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryBlobStore` and `MemoryVersionStore` that satisfy the
//! trait contracts without any external dependencies.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryBlobStore
// ---------------------------------------------------------------------------

/// In-memory content-addressed store backed by a `HashMap<digest, bytes>`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    store: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a blob, simulating eviction by an external retention policy.
    pub fn evict(&self, digest: &ContentDigest) {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.remove(digest.as_str());
    }

    pub fn len(&self) -> usize {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, data: &[u8]) -> StorageResult<ContentDigest> {
        let digest = ContentDigest::from_bytes(data);
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.insert(digest.as_str().to_string(), data.to_vec());
        Ok(digest)
    }

    async fn get(&self, digest: &ContentDigest) -> StorageResult<Vec<u8>> {
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store
            .get(digest.as_str())
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                digest: digest.as_str().to_string(),
            })
    }

    async fn contains(&self, digest: &ContentDigest) -> StorageResult<bool> {
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(store.contains_key(digest.as_str()))
    }
}

// ---------------------------------------------------------------------------
// MemoryVersionStore
// ---------------------------------------------------------------------------

/// In-memory version registry keyed by `(app_id, hash)`.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    rows: Mutex<HashMap<(String, String), VersionRecord>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn find(&self, app_id: &str, hash: &str) -> StorageResult<Option<VersionRecord>> {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.get(&(app_id.to_string(), hash.to_string())).cloned())
    }

    async fn upsert(&self, record: VersionRecord) -> StorageResult<VersionRecord> {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        rows.insert(
            (record.app_id.clone(), record.hash.clone()),
            record.clone(),
        );
        Ok(record)
    }

    async fn list(&self, app_id: &str) -> StorageResult<Vec<VersionRecord>> {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let mut versions: Vec<VersionRecord> = rows
            .values()
            .filter(|r| r.app_id == app_id)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(versions)
    }
}
