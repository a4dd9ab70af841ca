//! SurrealDB Handle - Connection and Version Operations
//!
//! Supports both local (in-memory) and remote (WebSocket or file) connections
//! through SurrealDB's `any` engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::StorageError;
use crate::storage_traits::{ContentDigest, StorageResult, VersionRecord};

const NAMESPACE: &str = "applet";
const DATABASE: &str = "main";

/// SurrealDB connection handle for the version registry
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbVersionRecord {
    app_id: String,
    hash: String,
    version: String,
    is_published: bool,
    artifact_digest: ContentDigest,
    created_at: SurrealDatetime,
}

impl From<VersionRecord> for DbVersionRecord {
    fn from(record: VersionRecord) -> Self {
        DbVersionRecord {
            app_id: record.app_id,
            hash: record.hash,
            version: record.version,
            is_published: record.is_published,
            artifact_digest: record.artifact_digest,
            created_at: SurrealDatetime::from(record.created_at),
        }
    }
}

impl DbVersionRecord {
    fn into_version_record(self) -> VersionRecord {
        VersionRecord {
            app_id: self.app_id,
            hash: self.hash,
            version: self.version,
            is_published: self.is_published,
            artifact_digest: self.artifact_digest,
            created_at: DateTime::<Utc>::from(self.created_at),
        }
    }
}

/// Record id of the row for `(app_id, hash)`. The length prefix keeps the
/// split point fixed whatever either part contains.
fn version_key(app_id: &str, hash: &str) -> String {
    format!("{}_{app_id}_{hash}", app_id.len())
}

impl SurrealHandle {
    /// Connect to SurrealDB in-memory and set up schema
    #[instrument(skip_all)]
    pub async fn setup_db() -> StorageResult<Self> {
        info!("Connecting to SurrealDB (in-memory)");
        Self::connect("mem://").await
    }

    /// Connect using environment variables
    ///
    /// If SURREALDB_URL is set, connects to that URL.
    /// Otherwise, falls back to in-memory.
    #[instrument(skip_all)]
    pub async fn setup_from_env() -> StorageResult<Self> {
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            info!("SURREALDB_URL found, connecting to {}", url);
            return Self::connect(&url).await;
        }

        info!("SURREALDB_URL not set, using in-memory database");
        Self::setup_db().await
    }

    async fn connect(url: &str) -> StorageResult<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect to {url}: {e}")))?;

        db.use_ns(NAMESPACE).use_db(DATABASE).await?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;
        info!("SurrealDB connected and schema initialized");
        Ok(handle)
    }

    async fn init_schema(&self) -> StorageResult<()> {
        debug!("Initializing version schema");

        let schema = r#"
            DEFINE TABLE IF NOT EXISTS versions SCHEMAFULL;
            DEFINE FIELD IF NOT EXISTS app_id ON versions TYPE string;
            DEFINE FIELD IF NOT EXISTS hash ON versions TYPE string;
            DEFINE FIELD IF NOT EXISTS version ON versions TYPE string;
            DEFINE FIELD IF NOT EXISTS is_published ON versions TYPE bool;
            DEFINE FIELD IF NOT EXISTS artifact_digest ON versions TYPE string;
            DEFINE FIELD IF NOT EXISTS created_at ON versions TYPE datetime;
            DEFINE INDEX IF NOT EXISTS idx_version_app_hash ON versions FIELDS app_id, hash UNIQUE;
            DEFINE INDEX IF NOT EXISTS idx_version_app ON versions FIELDS app_id;
        "#;

        self.db
            .query(schema)
            .await
            .and_then(|response| response.check())
            .map_err(|e| StorageError::Backend(format!("schema setup failed: {e}")))?;
        Ok(())
    }

    // ========== Version Operations ==========

    #[instrument(skip(self))]
    pub async fn version_find(
        &self,
        app_id: &str,
        hash: &str,
    ) -> StorageResult<Option<VersionRecord>> {
        let row: Option<DbVersionRecord> = self
            .db
            .select(("versions", version_key(app_id, hash)))
            .await?;
        Ok(row.map(DbVersionRecord::into_version_record))
    }

    /// Create or replace the row for `(app_id, hash)`.
    #[instrument(skip(self, record), fields(app_id = %record.app_id, version = %record.version))]
    pub async fn version_upsert(&self, record: VersionRecord) -> StorageResult<VersionRecord> {
        let key = version_key(&record.app_id, &record.hash);
        let row: Option<DbVersionRecord> = self
            .db
            .upsert(("versions", key))
            .content(DbVersionRecord::from(record))
            .await?;

        row.map(DbVersionRecord::into_version_record)
            .ok_or_else(|| StorageError::Backend("failed to upsert version record".to_string()))
    }

    /// All versions of an app, newest first.
    #[instrument(skip(self))]
    pub async fn version_list(&self, app_id: &str) -> StorageResult<Vec<VersionRecord>> {
        let mut result = self
            .db
            .query("SELECT * FROM versions WHERE app_id = $app_id ORDER BY created_at DESC")
            .bind(("app_id", app_id.to_string()))
            .await?;

        let rows: Vec<DbVersionRecord> = result.take(0)?;
        Ok(rows
            .into_iter()
            .map(DbVersionRecord::into_version_record)
            .collect())
    }
}
