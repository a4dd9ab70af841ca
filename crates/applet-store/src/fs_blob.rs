//! Filesystem-backed blob store
//!
//! Layout: `<root>/objects/<first 2 hex chars>/<remaining hex chars>`.
//! Writes go to a temporary file in the shard directory and are persisted
//! by rename, so a reader never observes a partial blob.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::{BlobStore, ContentDigest, StorageResult};

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    objects_dir: PathBuf,
}

impl FsBlobStore {
    /// Blob store rooted at `root`. Directories are created on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        FsBlobStore {
            objects_dir: root.as_ref().join("objects"),
        }
    }

    fn path_for(&self, digest: &ContentDigest) -> PathBuf {
        let hex = digest.as_str();
        self.objects_dir.join(&hex[..2]).join(&hex[2..])
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    let shard_dir = path
        .parent()
        .ok_or_else(|| StorageError::Backend(format!("blob path has no parent: {}", path.display())))?;
    std::fs::create_dir_all(shard_dir)?;

    let mut tmp = NamedTempFile::new_in(shard_dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, data: &[u8]) -> StorageResult<ContentDigest> {
        let digest = ContentDigest::from_bytes(data);
        let path = self.path_for(&digest);
        if tokio::fs::try_exists(&path).await? {
            return Ok(digest);
        }

        let data = data.to_vec();
        let len = data.len();
        tokio::task::spawn_blocking(move || write_atomic(&path, &data))
            .await
            .map_err(|e| StorageError::Backend(format!("blob write task failed: {e}")))??;

        debug!(digest = %digest.short(), bytes = len, "blob written");
        Ok(digest)
    }

    async fn get(&self, digest: &ContentDigest) -> StorageResult<Vec<u8>> {
        match tokio::fs::read(self.path_for(digest)).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::NotFound {
                digest: digest.as_str().to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn contains(&self, digest: &ContentDigest) -> StorageResult<bool> {
        Ok(tokio::fs::try_exists(self.path_for(digest)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blob_is_sharded_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let digest = store.put(b"artifact").await.unwrap();

        let expected = dir
            .path()
            .join("objects")
            .join(&digest.as_str()[..2])
            .join(&digest.as_str()[2..]);
        assert!(expected.is_file());
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let digest = store.put(b"a").await.unwrap();
        store.put(b"a").await.unwrap();

        let shard = dir.path().join("objects").join(&digest.as_str()[..2]);
        let names: Vec<_> = std::fs::read_dir(shard)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }
}
