//! Applet-Store: Artifact and Version Persistence
//!
//! Stores build artifacts by content digest and keeps one version row per
//! `(app_id, hash)` so identical builds are found instead of redone.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: Data integrity and idempotent writes.
//!
//! ## Key Components
//!
//! - `SurrealHandle`: Manages the SurrealDB connection and schema
//! - `BlobStore` / `FsBlobStore`: Content-addressed artifact bytes
//! - `VersionStore` / `SurrealVersionStore`: Hash-addressed version rows

mod error;
pub mod fakes;
mod fs_blob;
mod handle;
pub mod storage_traits;
mod surreal_versions;

pub use error::StorageError;
pub use fs_blob::FsBlobStore;
pub use handle::SurrealHandle;
pub use storage_traits::{
    BlobStore, ContentDigest, StorageResult, VersionRecord, VersionStore,
};
pub use surreal_versions::SurrealVersionStore;
