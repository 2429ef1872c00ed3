//! Cache store trait and the filesystem-backed store.
//!
//! The filesystem store keeps one JSON envelope per key under
//! `~/.config/repoprobe/cache/<namespace>/<sha256>.json`. The file's
//! mtime is its expiry time, so a refresh only moves the mtime and never
//! rewrites the value. Expired files are removed when encountered.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use thiserror::Error;
use time::OffsetDateTime;

use super::key::CacheKey;
use crate::clock::Clock;
use crate::models::Namespace;

/// Errors raised by a cache backend.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("redis error: {0}")]
    Redis(String),

    #[error("cache directory could not be determined")]
    NoDirectory,

    #[error("cache backend did not answer within {0:?}")]
    Timeout(Duration),
}

/// A key-value backend with per-entry expiry.
///
/// Implementations must tolerate concurrent readers and writers; `set` is
/// a blind overwrite (last write wins).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live value. Expired entries read as absent.
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError>;

    /// Write `value`, replacing any existing entry, expiring after `ttl`.
    async fn set(&self, key: &CacheKey, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Reset a live entry's expiry to `ttl` from now.
    ///
    /// Returns `false` when the entry is absent or already expired.
    async fn touch(&self, key: &CacheKey, ttl: Duration) -> Result<bool, CacheError>;

    /// Count stored entries.
    async fn stats(&self) -> Result<CacheStats, CacheError>;

    /// Remove every entry this store owns.
    async fn clear(&self) -> Result<CacheStats, CacheError>;

    /// Human-readable location (directory, URL) for diagnostics.
    fn location(&self) -> String;
}

/// Statistics about the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached entries.
    pub entries: usize,
    /// Total size in bytes.
    pub total_bytes: u64,
}

impl CacheStats {
    /// Format total_bytes as a human-readable string.
    pub fn human_size(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = 1024 * KB;

        if self.total_bytes >= MB {
            format!("{:.1} MiB", self.total_bytes as f64 / MB as f64)
        } else if self.total_bytes >= KB {
            format!("{:.1} KiB", self.total_bytes as f64 / KB as f64)
        } else {
            format!("{} B", self.total_bytes)
        }
    }
}

/// On-disk envelope for one entry. Expiry is the file mtime.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    /// Canonical key, kept to detect digest collisions.
    key: String,
    value: String,
}

fn file_time(at: OffsetDateTime) -> FileTime {
    FileTime::from_unix_time(at.unix_timestamp(), at.nanosecond())
}

/// Set `path`'s mtime to `at`. A missing file yields `Ok(false)`.
async fn set_expiry(path: &Path, at: OffsetDateTime) -> Result<bool, CacheError> {
    let target = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || filetime::set_file_mtime(&target, file_time(at)))
        .await
        .map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(CacheError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

const NAMESPACES: [Namespace; 3] = [Namespace::Content, Namespace::Listing, Namespace::Artifact];

/// Filesystem-based cache store.
pub struct FileStore {
    cache_dir: PathBuf,
    clock: Clock,
}

impl FileStore {
    /// Create a store in the default cache directory.
    pub fn new() -> Result<Self, CacheError> {
        let dir = Self::default_dir().ok_or(CacheError::NoDirectory)?;
        Ok(Self::new_with_dir(dir))
    }

    /// Create a store rooted at `cache_dir`.
    pub fn new_with_dir(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            clock: Clock::system(),
        }
    }

    /// Replace the clock used for expiry checks.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// `~/.config/repoprobe/cache`, if a config directory exists.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(crate::constants::CONFIG_DIR).join("cache"))
    }

    pub fn path(&self) -> &Path {
        &self.cache_dir
    }

    fn key_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir
            .join(key.namespace().as_ref())
            .join(format!("{}.json", key.digest()))
    }

    async fn read_entry(&self, key: &CacheKey) -> Result<Option<(PathBuf, StoredEntry)>, CacheError> {
        let path = self.key_path(key);
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        // Same handle for both, so value and expiry come from one file.
        let expires_at = match file.metadata().await.and_then(|m| m.modified()) {
            Ok(modified) => OffsetDateTime::from(modified),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        let mut content = String::new();
        if let Err(source) = file.read_to_string(&mut content).await {
            return Err(CacheError::Io { path, source });
        }

        let entry: StoredEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding corrupt cache file");
                let _ = tokio::fs::remove_file(&path).await;
                return Ok(None);
            }
        };

        if entry.key != key.to_string() {
            return Ok(None);
        }
        if expires_at <= self.clock.now() {
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }
        Ok(Some((path, entry)))
    }

    /// Write via a temp file and rename so readers never see a torn entry.
    /// The temp file gets its mtime first; rename keeps it.
    async fn write_entry(
        &self,
        path: &Path,
        entry: &StoredEntry,
        expires_at: OffsetDateTime,
    ) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| CacheError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let content = serde_json::to_string(entry)?;
        let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|source| CacheError::Io {
                path: tmp.clone(),
                source,
            })?;
        if !set_expiry(&tmp, expires_at).await? {
            return Err(CacheError::Io {
                path: tmp,
                source: std::io::ErrorKind::NotFound.into(),
            });
        }
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|source| CacheError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        Ok(self.read_entry(key).await?.map(|(_, entry)| entry.value))
    }

    async fn set(&self, key: &CacheKey, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = StoredEntry {
            key: key.to_string(),
            value: value.to_string(),
        };
        self.write_entry(&self.key_path(key), &entry, self.clock.deadline(ttl))
            .await
    }

    async fn touch(&self, key: &CacheKey, ttl: Duration) -> Result<bool, CacheError> {
        let Some((path, _)) = self.read_entry(key).await? else {
            return Ok(false);
        };
        // Only the mtime moves. A concurrent `set` that renamed a new file
        // into place keeps its value and gets this expiry.
        set_expiry(&path, self.clock.deadline(ttl)).await
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats::default();

        for ns in NAMESPACES {
            let dir = self.cache_dir.join(ns.as_ref());
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => return Err(CacheError::Io { path: dir, source }),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|source| CacheError::Io {
                    path: dir.clone(),
                    source,
                })?
            {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "json") {
                    stats.entries += 1;
                    stats.total_bytes += entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                }
            }
        }

        Ok(stats)
    }

    async fn clear(&self) -> Result<CacheStats, CacheError> {
        let stats = self.stats().await?;
        match tokio::fs::remove_dir_all(&self.cache_dir).await {
            Ok(()) => Ok(stats),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(stats),
            Err(source) => Err(CacheError::Io {
                path: self.cache_dir.clone(),
                source,
            }),
        }
    }

    fn location(&self) -> String {
        self.cache_dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operation, Scope};
    use time::macros::datetime;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn make_store(dir: &Path) -> (FileStore, Clock) {
        let clock = Clock::manual(datetime!(2024-05-01 12:00 UTC));
        (FileStore::new_with_dir(dir.to_path_buf()).with_clock(clock.clone()), clock)
    }

    fn key(op: Operation) -> CacheKey {
        CacheKey::new("acme", "widgets", "abc123", op, Scope::Repository)
    }

    #[tokio::test]
    async fn roundtrip_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = make_store(dir.path());

        store.set(&key(Operation::GenerateTests), "payload", DAY).await.unwrap();
        let cached = store.get(&key(Operation::GenerateTests)).await.unwrap();
        assert_eq!(cached.as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = make_store(dir.path());
        assert!(store.get(&key(Operation::DetectBugs)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_are_partitioned_by_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = make_store(dir.path());
        store.set(&key(Operation::ListFiles), "[]", DAY).await.unwrap();
        store.set(&key(Operation::GenerateMocks), "{}", DAY).await.unwrap();

        assert!(dir.path().join("listing").is_dir());
        assert!(dir.path().join("artifact").is_dir());
        assert!(!dir.path().join("content").exists());
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent_and_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let (store, clock) = make_store(dir.path());
        let k = key(Operation::GenerateTests);
        store.set(&k, "payload", DAY).await.unwrap();

        clock.advance(DAY - Duration::from_secs(1));
        assert!(store.get(&k).await.unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert!(store.get(&k).await.unwrap().is_none());
        assert_eq!(store.stats().await.unwrap().entries, 0);
    }

    #[tokio::test]
    async fn touch_extends_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let (store, clock) = make_store(dir.path());
        let k = key(Operation::GenerateTests);
        store.set(&k, "payload", DAY).await.unwrap();

        clock.advance(DAY - Duration::from_secs(60));
        assert!(store.touch(&k, DAY).await.unwrap());

        clock.advance(Duration::from_secs(3600));
        assert_eq!(store.get(&k).await.unwrap().as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn touch_leaves_value_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = make_store(dir.path());
        let k = key(Operation::GenerateTests);
        store.set(&k, "payload", DAY).await.unwrap();
        let path = store.key_path(&k);
        let before = std::fs::read_to_string(&path).unwrap();

        assert!(store.touch(&k, 2 * DAY).await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        let mtime = FileTime::from_last_modification_time(&std::fs::metadata(&path).unwrap());
        assert_eq!(mtime, file_time(datetime!(2024-05-03 12:00 UTC)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_touch_never_resurrects_old_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FileStore::new_with_dir(dir.path().to_path_buf()));
        let k = key(Operation::DetectBugs);

        for i in 0..200 {
            let old = format!("old-{i}");
            let new = format!("new-{i}");
            store.set(&k, &old, DAY).await.unwrap();

            let toucher = {
                let (store, k) = (store.clone(), k.clone());
                tokio::spawn(async move { store.touch(&k, DAY).await })
            };
            let writer = {
                let (store, k, new) = (store.clone(), k.clone(), new.clone());
                tokio::spawn(async move { store.set(&k, &new, DAY).await })
            };
            toucher.await.unwrap().unwrap();
            writer.await.unwrap().unwrap();

            assert_eq!(store.get(&k).await.unwrap(), Some(new), "iteration {i}");
        }
    }

    #[tokio::test]
    async fn touch_missing_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = make_store(dir.path());
        assert!(!store.touch(&key(Operation::RepoDocs), DAY).await.unwrap());
    }

    #[tokio::test]
    async fn set_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = make_store(dir.path());
        let k = key(Operation::LicenseScan);
        store.set(&k, "first", DAY).await.unwrap();
        store.set(&k, "second", DAY).await.unwrap();
        assert_eq!(store.get(&k).await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.stats().await.unwrap().entries, 1);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = make_store(dir.path());
        let k = key(Operation::GenerateTests);
        let path = store.key_path(&k);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        assert!(store.get(&k).await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn stats_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = make_store(&dir.path().join("cache"));
        let stats = store.stats().await.unwrap();
        assert_eq!(stats, CacheStats::default());
    }

    #[tokio::test]
    async fn clear_removes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let (store, _) = make_store(&cache_dir);
        store.set(&key(Operation::GenerateTests), "x", DAY).await.unwrap();
        store.set(&key(Operation::ListFiles), "y", DAY).await.unwrap();

        let stats = store.clear().await.unwrap();
        assert_eq!(stats.entries, 2);
        assert!(stats.total_bytes > 0);
        assert!(!cache_dir.exists());
    }

    #[tokio::test]
    async fn clear_empty_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = make_store(&dir.path().join("nonexistent_cache"));
        assert_eq!(store.clear().await.unwrap().entries, 0);
    }

    #[test]
    fn location_is_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = make_store(dir.path());
        assert_eq!(store.location(), dir.path().display().to_string());
        assert_eq!(store.path(), dir.path());
    }

    #[test]
    fn human_size_units() {
        let at = |total_bytes| CacheStats { entries: 1, total_bytes }.human_size();
        assert_eq!(at(500), "500 B");
        assert_eq!(at(2048), "2.0 KiB");
        assert_eq!(at(2 * 1024 * 1024), "2.0 MiB");
    }
}
