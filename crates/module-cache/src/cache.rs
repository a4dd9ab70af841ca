//! Remote module cache
//!
//! A TTL cache for third-party module content fetched during bundling.
//! It is fail-open: every store error or timeout is logged and treated as a
//! miss, so a build never depends on the cache being reachable.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CacheError, FetchError, Result};
use crate::fetch::ModuleFetcher;
use crate::kv::KvStore;

/// Expiry used when the response headers do not yield one (one week).
pub const DEFAULT_TTL_SECS: i64 = 604_800;

/// A fetched module: its final specifier, lowercased response headers and
/// source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteModule {
    pub specifier: String,
    pub headers: BTreeMap<String, String>,
    pub content: String,
}

impl RemoteModule {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// What is stored under a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub module_record: RemoteModule,
    /// Milliseconds since the Unix epoch
    pub cached_timestamp: i64,
}

/// Key namespace. Bumping `epoch` invalidates every existing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheKeyConfig {
    pub namespace: String,
    pub epoch: u32,
}

impl Default for CacheKeyConfig {
    fn default() -> Self {
        CacheKeyConfig {
            namespace: "applet-modules".to_string(),
            epoch: 1,
        }
    }
}

impl CacheKeyConfig {
    pub fn key(&self, specifier: &str, target: &str) -> String {
        format!(
            "{}-{}[{specifier}][target-{target}]",
            self.namespace, self.epoch
        )
    }
}

/// Upper bound on any computed TTL: one year.
pub const MAX_TTL_SECS: i64 = 31_536_000;

/// Seconds a module may stay cached, from its `cache-control` and `age`
/// headers. Falls back to [`DEFAULT_TTL_SECS`] unless both parse; never
/// exceeds [`MAX_TTL_SECS`].
pub fn ttl_seconds(headers: &BTreeMap<String, String>) -> i64 {
    let max_age = headers.get("cache-control").and_then(|cc| max_age(cc));
    let age = headers
        .get("age")
        .and_then(|a| a.trim().parse::<i64>().ok());
    match (max_age, age) {
        (Some(max_age), Some(age)) => max_age.saturating_sub(age).min(MAX_TTL_SECS),
        _ => DEFAULT_TTL_SECS,
    }
}

fn max_age(cache_control: &str) -> Option<i64> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("max-age") {
            value.trim().trim_matches('"').parse().ok()
        } else {
            None
        }
    })
}

/// Shared, thread-safe cache handle passed into the bundle builder.
#[derive(Clone)]
pub struct RemoteModuleCache {
    store: Arc<dyn KvStore>,
    keys: CacheKeyConfig,
    timeout: Duration,
}

impl RemoteModuleCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        RemoteModuleCache {
            store,
            keys: CacheKeyConfig::default(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_keys(mut self, keys: CacheKeyConfig) -> Self {
        self.keys = keys;
        self
    }

    /// Bound on each store round trip.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn key(&self, specifier: &str, target: &str) -> String {
        self.keys.key(specifier, target)
    }

    /// Cached module, with its `age` header advanced by the whole seconds
    /// elapsed since it was stored. Never fails: errors read as a miss.
    pub async fn get(&self, specifier: &str, target: &str) -> Option<RemoteModule> {
        let key = self.key(specifier, target);
        match self.try_get(&key).await {
            Ok(Some(record)) => {
                debug!(key = %key, "module cache hit");
                Some(refresh_age(record))
            }
            Ok(None) => {
                debug!(key = %key, "module cache miss");
                None
            }
            Err(err) => {
                warn!(event = "cache.get_failed", key = %key, error = %err, "module cache read failed");
                None
            }
        }
    }

    /// Store a module with an expiry derived from its headers. Errors are
    /// logged and swallowed.
    pub async fn set(&self, specifier: &str, target: &str, module: &RemoteModule) {
        let key = self.key(specifier, target);
        let ttl = ttl_seconds(&module.headers);
        if ttl <= 0 {
            debug!(key = %key, ttl, "module already stale; not caching");
            return;
        }
        let record = CacheRecord {
            module_record: module.clone(),
            cached_timestamp: Utc::now().timestamp_millis(),
        };
        if let Err(err) = self.try_set(&key, &record, ttl.unsigned_abs()).await {
            warn!(event = "cache.set_failed", key = %key, error = %err, "module cache write failed");
        }
    }

    /// Cached module or, on a miss, fetch it and populate the cache.
    pub async fn load(
        &self,
        specifier: &str,
        target: &str,
        fetcher: &dyn ModuleFetcher,
    ) -> std::result::Result<RemoteModule, FetchError> {
        if let Some(module) = self.get(specifier, target).await {
            return Ok(module);
        }
        let module = fetcher.fetch(specifier).await?;
        self.set(specifier, target, &module).await;
        Ok(module)
    }

    async fn try_get(&self, key: &str) -> Result<Option<CacheRecord>> {
        let raw = self.bounded(self.store.get(key)).await??;
        raw.map(|raw| serde_json::from_str(&raw).map_err(CacheError::from))
            .transpose()
    }

    async fn try_set(&self, key: &str, record: &CacheRecord, ttl: u64) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        self.bounded(self.store.set(key, &raw)).await??;
        self.bounded(self.store.expire(key, ttl)).await??;
        Ok(())
    }

    async fn bounded<F: std::future::Future>(&self, fut: F) -> Result<F::Output> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| CacheError::Timeout(self.timeout))
    }
}

fn refresh_age(record: CacheRecord) -> RemoteModule {
    let CacheRecord {
        mut module_record,
        cached_timestamp,
    } = record;
    let elapsed_secs = Utc::now()
        .timestamp_millis()
        .saturating_sub(cached_timestamp)
        .max(0)
        / 1000;
    let age = module_record
        .header("age")
        .and_then(|a| a.trim().parse::<i64>().ok())
        .unwrap_or(0);
    module_record
        .headers
        .insert("age".to_string(), age.saturating_add(elapsed_secs).to_string());
    module_record
}
