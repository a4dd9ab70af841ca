//! Module-Cache: Remote Modules for Applet Bundles
//!
//! Fetches third-party ES modules over HTTP and keeps them in a shared
//! key/value store with a TTL derived from the origin's `cache-control`
//! and `age` headers.
//!
//! ## Layer 2 - Network Edge
//!
//! Focus: the cache is a pure performance optimization. Reads and writes
//! never fail a build.

pub mod cache;
pub mod error;
pub mod fetch;
pub mod kv;
pub mod rest;

pub use cache::{
    ttl_seconds, CacheKeyConfig, CacheRecord, RemoteModule, RemoteModuleCache, DEFAULT_TTL_SECS,
    MAX_TTL_SECS,
};
pub use error::{CacheError, FetchError, Result};
pub use fetch::{HttpFetcher, ModuleFetcher};
pub use kv::{KvStore, MemoryKvStore};
pub use rest::{RestKvConfig, RestKvStore};
