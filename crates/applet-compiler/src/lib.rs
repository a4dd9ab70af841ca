//! Applet-Compiler: Hashing, Versioning and Bundling
//!
//! Turns an app aggregate (scripts plus metadata) into a content-addressed
//! version and a self-contained module-graph artifact.
//!
//! ## Layer 3 - Orchestration
//!
//! Focus: identical input always yields the identical hash, version and
//! artifact. A build either completes or fails as a whole.
//!
//! ## Key Components
//!
//! - `hasher`: `script_hash`, `app_hash`, version ids
//! - `ImportRewriter`: specifier normalization for the runtime
//! - `BundleBuilder`: concurrent module-graph resolution
//! - `Publisher`: hash-addressed build cache over the version and blob stores

pub mod bundle;
pub mod config;
pub mod digest;
pub mod error;
pub mod hasher;
pub mod metrics;
pub mod model;
pub mod obs;
pub mod publish;
pub mod rewrite;
pub mod schema;
pub mod telemetry;

pub use bundle::{BundleArtifact, BundleBuilder, GraphModule, Namespaces, SpecifierClass};
pub use config::BuildConfig;
pub use digest::{canonical_json, compute_digest};
pub use error::{BuildError, Result};
pub use hasher::{
    app_hash, app_hash_and_version, deployment_url, script_hash, version_from_hash, AppVersion,
    UNVERSIONED_FRAMEWORK,
};
pub use metrics::METRICS;
pub use model::{App, Script};
pub use publish::{PublishOutcome, Publisher};
pub use rewrite::ImportRewriter;
pub use schema::validate_app;
pub use telemetry::init_tracing;
