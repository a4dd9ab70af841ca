//! SurrealDB-backed [`VersionStore`]: one `versions` row per `(app_id, hash)`,
//! written with upsert so repeated publishes converge.

use std::sync::Arc;

use async_trait::async_trait;

use crate::storage_traits::{StorageResult, VersionRecord, VersionStore};
use crate::SurrealHandle;

/// SurrealDB-backed implementation of the VersionStore trait.
#[derive(Clone)]
pub struct SurrealVersionStore {
    handle: Arc<SurrealHandle>,
}

impl SurrealVersionStore {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl VersionStore for SurrealVersionStore {
    async fn find(&self, app_id: &str, hash: &str) -> StorageResult<Option<VersionRecord>> {
        self.handle.version_find(app_id, hash).await
    }

    async fn upsert(&self, record: VersionRecord) -> StorageResult<VersionRecord> {
        self.handle.version_upsert(record).await
    }

    async fn list(&self, app_id: &str) -> StorageResult<Vec<VersionRecord>> {
        self.handle.version_list(app_id).await
    }
}
