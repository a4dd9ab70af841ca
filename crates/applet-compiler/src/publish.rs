//! Hash-addressed build cache in front of the Bundle Builder.
//!
//! `publish` computes the app's `{hash, version}` first. A version row for
//! that hash whose artifact blob is still present is returned as-is;
//! otherwise the app is built, its version row upserted, and the artifact
//! written to blob storage on a background task.

use std::sync::Arc;

use applet_store::{BlobStore, ContentDigest, StorageError, VersionRecord, VersionStore};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::bundle::BundleBuilder;
use crate::error::{BuildError, Result};
use crate::hasher::app_hash_and_version;
use crate::metrics::METRICS;
use crate::model::App;
use crate::obs;
use crate::schema::validate_app;

/// Result of one publish.
#[derive(Debug)]
pub struct PublishOutcome {
    pub record: VersionRecord,
    /// True when an existing artifact was reused and nothing was built
    pub reused: bool,
    /// Pending artifact upload; `None` when reused
    pub upload: Option<JoinHandle<Result<ContentDigest>>>,
}

impl PublishOutcome {
    /// Wait for the artifact upload, if there is one.
    pub async fn finish(self) -> Result<VersionRecord> {
        if let Some(upload) = self.upload {
            upload.await??;
        }
        Ok(self.record)
    }
}

pub struct Publisher {
    builder: BundleBuilder,
    versions: Arc<dyn VersionStore>,
    blobs: Arc<dyn BlobStore>,
}

impl Publisher {
    pub fn new(
        builder: BundleBuilder,
        versions: Arc<dyn VersionStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Publisher {
            builder,
            versions,
            blobs,
        }
    }

    pub async fn publish(
        &self,
        app: &App,
        target: &str,
        base_url: Option<&str>,
    ) -> Result<PublishOutcome> {
        validate_app(app)?;
        let av = app_hash_and_version(app, &self.builder.config().framework_version)?;

        if let Some(existing) = self.versions.find(&app.id, &av.hash).await? {
            if self.artifact_present(&existing.artifact_digest).await {
                METRICS.inc_reused();
                obs::emit_publish_reused(&app.id, &existing.version, existing.artifact_digest.as_str());
                return Ok(PublishOutcome {
                    record: existing,
                    reused: true,
                    upload: None,
                });
            }
        }

        let artifact = self
            .builder
            .build(target, app, &av.version, base_url)
            .await?;
        let bytes = artifact.to_bytes()?;
        let digest = ContentDigest::from_bytes(&bytes);

        let record = self
            .versions
            .upsert(VersionRecord::new(&app.id, &av.hash, &av.version, digest.clone()).published())
            .await?;
        obs::emit_publish_stored(&app.id, &record.version, digest.as_str(), bytes.len());

        let upload = self.spawn_upload(app.id.clone(), digest, bytes);
        Ok(PublishOutcome {
            record,
            reused: false,
            upload: Some(upload),
        })
    }

    async fn artifact_present(&self, digest: &ContentDigest) -> bool {
        self.blobs.contains(digest).await.unwrap_or_else(|err| {
            warn!(digest = %digest, error = %err, "blob lookup failed; rebuilding");
            false
        })
    }

    fn spawn_upload(
        &self,
        app_id: String,
        digest: ContentDigest,
        bytes: Vec<u8>,
    ) -> JoinHandle<Result<ContentDigest>> {
        let blobs = Arc::clone(&self.blobs);
        let timeout = self.builder.config().network_timeout;
        tokio::spawn(async move {
            let written = match tokio::time::timeout(timeout, blobs.put(&bytes)).await {
                Ok(result) => result.map_err(BuildError::from),
                Err(_) => Err(BuildError::Storage(StorageError::Backend(format!(
                    "blob write timed out after {timeout:?}"
                )))),
            };
            if let Err(err) = &written {
                obs::emit_blob_write_failed(&app_id, digest.as_str(), err);
            }
            written
        })
    }
}
