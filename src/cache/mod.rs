//! Commit-keyed result cache.
//!
//! Results are addressed by [`CacheKey`] (owner, repo, commit, operation,
//! scope). A push to the default branch changes the commit id, so stale
//! entries are simply never addressed again and age out by TTL. A hit
//! resets the entry's TTL so hot entries stay resident.
//!
//! The engine never fails a request because of the cache: a backend
//! error or timeout on lookup is a miss, one on store is logged.

pub mod key;
pub mod memory;
pub mod redis;
pub mod store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use key::CacheKey;
pub use memory::MemoryStore;
pub use redis::RedisStore;
pub use store::{CacheError, CacheStats, CacheStore, FileStore};

use crate::config::{CacheBackend, CacheConfig};
use crate::constants::CACHE_OP_TIMEOUT;

/// Whether a value came from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

/// A value plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached<T> {
    pub value: T,
    pub status: CacheStatus,
}

impl<T> Cached<T> {
    pub fn hit(value: T) -> Self {
        Self {
            value,
            status: CacheStatus::Hit,
        }
    }

    pub fn miss(value: T) -> Self {
        Self {
            value,
            status: CacheStatus::Miss,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.status == CacheStatus::Hit
    }
}

/// The cache engine shared by every operation.
pub struct CacheEngine {
    enabled: bool,
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    op_timeout: Duration,
}

impl CacheEngine {
    /// An enabled engine over `store`.
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            enabled: true,
            store,
            ttl,
            op_timeout: CACHE_OP_TIMEOUT,
        }
    }

    /// Replace the per-call backend timeout.
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// An engine that always misses and never stores.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            store: Arc::new(MemoryStore::new()),
            ttl: crate::constants::DEFAULT_CACHE_TTL,
            op_timeout: CACHE_OP_TIMEOUT,
        }
    }

    /// Build the engine selected by configuration.
    ///
    /// Returns an error only when the configured backend cannot be set up
    /// at all (e.g. a malformed Redis URL); reachability is checked lazily.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let ttl = Duration::from_secs(config.ttl_secs);
        let store: Arc<dyn CacheStore> = match config.backend {
            CacheBackend::Memory => Arc::new(MemoryStore::new()),
            CacheBackend::File => match &config.dir {
                Some(dir) => Arc::new(FileStore::new_with_dir(dir.clone())),
                None => Arc::new(FileStore::new()?),
            },
            CacheBackend::Redis => {
                let url = config
                    .redis_url
                    .as_deref()
                    .ok_or_else(|| CacheError::Redis("no redis_url configured".into()))?;
                Arc::new(RedisStore::connect(url, CACHE_OP_TIMEOUT)?)
            }
        };

        let mut engine = Self::new(store, ttl);
        engine.enabled = config.enabled;
        Ok(engine)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Default time-to-live for new entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a value, refreshing its TTL on a hit.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let raw = self.lookup_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cached value did not decode, treating as miss");
                None
            }
        }
    }

    /// Look up the stored JSON text, refreshing its TTL on a hit.
    pub async fn lookup_raw(&self, key: &CacheKey) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let value = match self.bounded(self.store.get(key)).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache lookup failed, treating as miss");
                return None;
            }
        };

        if let Err(e) = self.bounded(self.store.touch(key, self.ttl)).await {
            tracing::warn!(key = %key, error = %e, "failed to refresh cache entry expiry");
        }
        tracing::debug!(key = %key, "cache hit");
        Some(value)
    }

    /// Store a value. Failures are logged, never returned.
    pub async fn store<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        if !self.enabled {
            return;
        }

        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to encode value for cache");
                return;
            }
        };
        if let Err(e) = self.bounded(self.store.set(key, &json, ttl)).await {
            tracing::warn!(key = %key, error = %e, "failed to write cache entry");
        }
    }

    /// Return the cached value or compute, store, and return a fresh one.
    ///
    /// Errors from `compute` are returned unchanged and nothing is stored.
    pub async fn get_or_compute<T, E, F, Fut>(&self, key: &CacheKey, compute: F) -> Result<Cached<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.lookup(key).await {
            return Ok(Cached::hit(value));
        }
        let value = compute().await?;
        self.store(key, &value, self.ttl).await;
        Ok(Cached::miss(value))
    }

    /// Remove all cached entries.
    pub async fn clear(&self) -> Result<CacheStats, CacheError> {
        self.bounded(self.store.clear()).await
    }

    /// Compute statistics about the cache.
    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        self.bounded(self.store.stats()).await
    }

    /// Where the backend keeps its data.
    pub fn location(&self) -> String {
        self.store.location()
    }

    /// Run one backend call under the per-call timeout.
    async fn bounded<T>(&self, call: impl Future<Output = Result<T, CacheError>>) -> Result<T, CacheError> {
        tokio::time::timeout(self.op_timeout, call)
            .await
            .unwrap_or(Err(CacheError::Timeout(self.op_timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::models::{Operation, Scope};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::macros::datetime;

    const DAY: Duration = Duration::from_secs(86400);

    fn key(commit: &str) -> CacheKey {
        CacheKey::new("acme", "widgets", commit, Operation::GenerateTests, Scope::Repository)
    }

    fn engine_with_clock() -> (CacheEngine, Arc<MemoryStore>, Clock) {
        let clock = Clock::manual(datetime!(2024-03-01 9:00 UTC));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        (CacheEngine::new(store.clone(), DAY), store, clock)
    }

    /// A store whose every call fails.
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _: &CacheKey) -> Result<Option<String>, CacheError> {
            Err(CacheError::Redis("connection refused".into()))
        }
        async fn set(&self, _: &CacheKey, _: &str, _: Duration) -> Result<(), CacheError> {
            Err(CacheError::Redis("connection refused".into()))
        }
        async fn touch(&self, _: &CacheKey, _: Duration) -> Result<bool, CacheError> {
            Err(CacheError::Redis("connection refused".into()))
        }
        async fn stats(&self) -> Result<CacheStats, CacheError> {
            Err(CacheError::Redis("connection refused".into()))
        }
        async fn clear(&self) -> Result<CacheStats, CacheError> {
            Err(CacheError::Redis("connection refused".into()))
        }
        fn location(&self) -> String {
            "broken".into()
        }
    }

    /// A store that never answers.
    struct HangingStore;

    #[async_trait]
    impl CacheStore for HangingStore {
        async fn get(&self, _: &CacheKey) -> Result<Option<String>, CacheError> {
            std::future::pending().await
        }
        async fn set(&self, _: &CacheKey, _: &str, _: Duration) -> Result<(), CacheError> {
            std::future::pending().await
        }
        async fn touch(&self, _: &CacheKey, _: Duration) -> Result<bool, CacheError> {
            std::future::pending().await
        }
        async fn stats(&self) -> Result<CacheStats, CacheError> {
            std::future::pending().await
        }
        async fn clear(&self) -> Result<CacheStats, CacheError> {
            std::future::pending().await
        }
        fn location(&self) -> String {
            "hanging".into()
        }
    }

    #[tokio::test]
    async fn unresponsive_store_times_out_as_miss() {
        let engine = CacheEngine::new(Arc::new(HangingStore), DAY).with_op_timeout(Duration::from_millis(50));
        let calls = &AtomicUsize::new(0);

        let result = engine
            .get_or_compute(&key("abc123"), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>("fresh".to_string())
            })
            .await
            .unwrap();

        assert_eq!(result, Cached::miss("fresh".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(engine.stats().await, Err(CacheError::Timeout(_))));
    }

    #[tokio::test]
    async fn store_then_lookup() {
        let (engine, _, _) = engine_with_clock();
        engine.store(&key("abc123"), &vec![1, 2, 3], engine.ttl()).await;
        let got: Option<Vec<i32>> = engine.lookup(&key("abc123")).await;
        assert_eq!(got, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn different_commit_misses() {
        let (engine, _, _) = engine_with_clock();
        engine.store(&key("abc123"), &"old", engine.ttl()).await;
        assert!(engine.lookup::<String>(&key("def456")).await.is_none());
    }

    #[tokio::test]
    async fn hit_refreshes_ttl() {
        let (engine, store, clock) = engine_with_clock();
        let k = key("abc123");
        engine.store(&k, &"v", DAY).await;

        clock.advance(Duration::from_secs(23 * 3600));
        assert!(engine.lookup::<String>(&k).await.is_some());
        assert_eq!(store.expires_at(&k), Some(datetime!(2024-03-02 8:00 UTC) + DAY));

        // Past the original expiry, but within the refreshed one.
        clock.advance(Duration::from_secs(2 * 3600));
        assert!(engine.lookup::<String>(&k).await.is_some());
    }

    #[tokio::test]
    async fn entry_expires_without_access() {
        let (engine, _, clock) = engine_with_clock();
        let k = key("abc123");
        engine.store(&k, &"v", DAY).await;
        clock.advance(DAY + Duration::from_secs(1));
        assert!(engine.lookup::<String>(&k).await.is_none());
    }

    #[tokio::test]
    async fn undecodable_value_is_a_miss() {
        let (engine, store, _) = engine_with_clock();
        let k = key("abc123");
        store.set(&k, "not json", DAY).await.unwrap();
        assert!(engine.lookup::<Vec<String>>(&k).await.is_none());
    }

    #[tokio::test]
    async fn disabled_engine_never_hits() {
        let engine = CacheEngine::disabled();
        engine.store(&key("abc123"), &"v", DAY).await;
        assert!(engine.lookup::<String>(&key("abc123")).await.is_none());
        assert!(!engine.is_enabled());
    }

    #[tokio::test]
    async fn broken_backend_degrades_to_miss() {
        let engine = CacheEngine::new(Arc::new(BrokenStore), DAY);
        engine.store(&key("abc123"), &"v", DAY).await;
        assert!(engine.lookup::<String>(&key("abc123")).await.is_none());

        let out: Result<Cached<String>, ()> =
            engine.get_or_compute(&key("abc123"), || async { Ok("fresh".to_string()) }).await;
        assert_eq!(out, Ok(Cached::miss("fresh".to_string())));
    }

    #[tokio::test]
    async fn get_or_compute_computes_once() {
        let (engine, _, _) = engine_with_clock();
        let calls = &AtomicUsize::new(0);
        let compute = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>("value".to_string())
        };

        let first = engine.get_or_compute(&key("abc123"), compute).await.unwrap();
        let second = engine.get_or_compute(&key("abc123"), compute).await.unwrap();
        assert!(!first.is_hit());
        assert!(second.is_hit());
        assert_eq!(first.value, second.value);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_or_compute_does_not_cache_errors() {
        let (engine, store, _) = engine_with_clock();
        let out: Result<Cached<String>, &str> =
            engine.get_or_compute(&key("abc123"), || async { Err("upstream down") }).await;
        assert_eq!(out, Err("upstream down"));
        assert!(store.is_empty());
    }

    #[test]
    fn from_config_memory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CacheConfig {
            backend: CacheBackend::File,
            dir: Some(dir.path().to_path_buf()),
            ..CacheConfig::default()
        };
        let engine = CacheEngine::from_config(&config).unwrap();
        assert_eq!(engine.location(), dir.path().display().to_string());
        assert_eq!(engine.ttl(), DAY);

        config.backend = CacheBackend::Memory;
        config.enabled = false;
        let engine = CacheEngine::from_config(&config).unwrap();
        assert_eq!(engine.location(), "memory");
        assert!(!engine.is_enabled());
    }

    #[test]
    fn from_config_redis_requires_url() {
        let config = CacheConfig {
            backend: CacheBackend::Redis,
            redis_url: None,
            ..CacheConfig::default()
        };
        assert!(CacheEngine::from_config(&config).is_err());
    }
}
