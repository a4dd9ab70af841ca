//! Contract tests for the remote module cache.
//!
//! The cache must be fail-open and must derive expiry from response
//! headers. These run against the in-memory store and hand-written
//! failing stores.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use module_cache::{
    CacheError, CacheKeyConfig, CacheRecord, FetchError, KvStore, MemoryKvStore, ModuleFetcher,
    RemoteModule, RemoteModuleCache, MAX_TTL_SECS,
};

fn module(specifier: &str, headers: &[(&str, &str)]) -> RemoteModule {
    RemoteModule {
        specifier: specifier.to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        content: "export const x = 1;".to_string(),
    }
}

struct BrokenStore;

#[async_trait]
impl KvStore for BrokenStore {
    async fn get(&self, _key: &str) -> module_cache::Result<Option<String>> {
        Err(CacheError::Backend("connection refused".into()))
    }
    async fn set(&self, _key: &str, _value: &str) -> module_cache::Result<()> {
        Err(CacheError::Backend("connection refused".into()))
    }
    async fn expire(&self, _key: &str, _seconds: u64) -> module_cache::Result<bool> {
        Err(CacheError::Backend("connection refused".into()))
    }
}

struct HangingStore;

#[async_trait]
impl KvStore for HangingStore {
    async fn get(&self, _key: &str) -> module_cache::Result<Option<String>> {
        std::future::pending().await
    }
    async fn set(&self, _key: &str, _value: &str) -> module_cache::Result<()> {
        std::future::pending().await
    }
    async fn expire(&self, _key: &str, _seconds: u64) -> module_cache::Result<bool> {
        std::future::pending().await
    }
}

#[derive(Default)]
struct CountingFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl ModuleFetcher for CountingFetcher {
    async fn fetch(&self, specifier: &str) -> Result<RemoteModule, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(module(specifier, &[("cache-control", "max-age=600")]))
    }
}

// ── Expiry ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn set_applies_header_derived_ttl() {
    let store = Arc::new(MemoryKvStore::new());
    let cache = RemoteModuleCache::new(store.clone());
    let m = module(
        "https://esm.sh/a",
        &[("cache-control", "max-age=600"), ("age", "100")],
    );
    cache.set("https://esm.sh/a", "deno", &m).await;

    let ttl = store.ttl(&cache.key("https://esm.sh/a", "deno")).unwrap();
    assert!(ttl <= Duration::from_secs(500) && ttl > Duration::from_secs(498));
}

#[tokio::test]
async fn set_without_headers_uses_one_week() {
    let store = Arc::new(MemoryKvStore::new());
    let cache = RemoteModuleCache::new(store.clone());
    cache.set("https://esm.sh/b", "deno", &module("https://esm.sh/b", &[])).await;

    let ttl = store.ttl(&cache.key("https://esm.sh/b", "deno")).unwrap();
    assert!(ttl > Duration::from_secs(604_790));
}

#[tokio::test]
async fn stale_module_is_not_stored() {
    let store = Arc::new(MemoryKvStore::new());
    let cache = RemoteModuleCache::new(store.clone());
    let m = module("https://x/c", &[("cache-control", "max-age=60"), ("age", "60")]);
    cache.set("https://x/c", "deno", &m).await;

    assert!(store.is_empty());
    assert_eq!(cache.get("https://x/c", "deno").await, None);
}

#[test]
fn hostile_headers_never_overflow_the_ttl() {
    let h = |cc: &str, age: &str| -> BTreeMap<String, String> {
        [("cache-control", cc), ("age", age)]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    };
    assert_eq!(
        module_cache::ttl_seconds(&h("max-age=9223372036854775807", "-1")),
        MAX_TTL_SECS
    );
    assert!(module_cache::ttl_seconds(&h("max-age=-9223372036854775808", "1")) <= 0);
}

#[tokio::test]
async fn huge_max_age_is_stored_with_capped_ttl() {
    let store = Arc::new(MemoryKvStore::new());
    let cache = RemoteModuleCache::new(store.clone());
    let m = module(
        "https://x/huge",
        &[("cache-control", "max-age=9223372036854775807"), ("age", "0")],
    );
    cache.set("https://x/huge", "deno", &m).await;

    let ttl = store.ttl(&cache.key("https://x/huge", "deno")).unwrap();
    assert!(ttl <= Duration::from_secs(MAX_TTL_SECS as u64));
    assert!(cache.get("https://x/huge", "deno").await.is_some());
}

// ── Reads ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn hit_advances_age_by_elapsed_seconds() {
    let store = Arc::new(MemoryKvStore::new());
    let cache = RemoteModuleCache::new(store.clone());
    let m = module("https://x/d", &[("age", "10"), ("content-type", "text/javascript")]);
    let record = CacheRecord {
        module_record: m.clone(),
        cached_timestamp: Utc::now().timestamp_millis() - 30_500,
    };
    store
        .set(
            &cache.key("https://x/d", "deno"),
            &serde_json::to_string(&record).unwrap(),
        )
        .await
        .unwrap();

    let got = cache.get("https://x/d", "deno").await.unwrap();
    assert_eq!(got.header("age"), Some("40"));
    assert_eq!(got.header("content-type"), Some("text/javascript"));
    assert_eq!(got.content, m.content);
    assert_eq!(got.specifier, m.specifier);
}

#[tokio::test]
async fn hit_with_saturated_age_does_not_overflow() {
    let store = Arc::new(MemoryKvStore::new());
    let cache = RemoteModuleCache::new(store.clone());
    let record = CacheRecord {
        module_record: module("https://x/old", &[("age", "9223372036854775807")]),
        cached_timestamp: i64::MIN,
    };
    store
        .set(
            &cache.key("https://x/old", "deno"),
            &serde_json::to_string(&record).unwrap(),
        )
        .await
        .unwrap();

    let got = cache.get("https://x/old", "deno").await.unwrap();
    assert_eq!(got.header("age"), Some("9223372036854775807"));
}

#[tokio::test]
async fn hit_without_age_header_starts_from_zero() {
    let store = Arc::new(MemoryKvStore::new());
    let cache = RemoteModuleCache::new(store);
    cache.set("https://x/e", "deno", &module("https://x/e", &[])).await;

    let got = cache.get("https://x/e", "deno").await.unwrap();
    assert_eq!(got.header("age"), Some("0"));
}

#[tokio::test]
async fn targets_and_epochs_are_separate_keys() {
    let store = Arc::new(MemoryKvStore::new());
    let cache = RemoteModuleCache::new(store.clone());
    cache.set("https://x/f", "deno", &module("https://x/f", &[])).await;

    assert!(cache.get("https://x/f", "browser").await.is_none());
    let bumped = RemoteModuleCache::new(store).with_keys(CacheKeyConfig {
        namespace: "applet-modules".into(),
        epoch: 2,
    });
    assert!(bumped.get("https://x/f", "deno").await.is_none());
}

#[tokio::test]
async fn corrupt_record_reads_as_miss() {
    let store = Arc::new(MemoryKvStore::new());
    let cache = RemoteModuleCache::new(store.clone());
    store
        .set(&cache.key("https://x/g", "deno"), "{not json")
        .await
        .unwrap();
    assert!(cache.get("https://x/g", "deno").await.is_none());
}

// ── Fail-open ───────────────────────────────────────────────────────────

#[tokio::test]
async fn backend_errors_are_swallowed() {
    let cache = RemoteModuleCache::new(Arc::new(BrokenStore));
    cache.set("https://x/h", "deno", &module("https://x/h", &[])).await;
    assert!(cache.get("https://x/h", "deno").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn hanging_backend_times_out_as_miss() {
    let cache =
        RemoteModuleCache::new(Arc::new(HangingStore)).with_timeout(Duration::from_millis(50));
    assert!(cache.get("https://x/i", "deno").await.is_none());
    cache.set("https://x/i", "deno", &module("https://x/i", &[])).await;
}

#[tokio::test]
async fn load_falls_through_to_fetcher_when_store_is_down() {
    let cache = RemoteModuleCache::new(Arc::new(BrokenStore));
    let fetcher = CountingFetcher::default();
    let got = cache.load("https://x/j", "deno", &fetcher).await.unwrap();
    assert_eq!(got.specifier, "https://x/j");
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn load_fetches_once_then_hits() {
    let cache = RemoteModuleCache::new(Arc::new(MemoryKvStore::new()));
    let fetcher = CountingFetcher::default();
    cache.load("https://x/k", "deno", &fetcher).await.unwrap();
    let second = cache.load("https://x/k", "deno", &fetcher).await.unwrap();

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.header("cache-control"), Some("max-age=600"));
    let expected: BTreeMap<String, String> = [
        ("age".to_string(), "0".to_string()),
        ("cache-control".to_string(), "max-age=600".to_string()),
    ]
    .into();
    assert_eq!(second.headers, expected);
}
