//! In-process cache store.
//!
//! Used when no persistent backend is configured and throughout the
//! test suite, where a manual [`Clock`] makes TTL expiry deterministic.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::key::CacheKey;
use super::store::{CacheError, CacheStats, CacheStore};
use crate::clock::Clock;

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: OffsetDateTime,
}

/// A `HashMap` behind a mutex, partitioned by namespace prefix.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Slot>>,
    clock: Clock,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            entries: Mutex::default(),
            clock,
        }
    }

    /// Expiry of a live entry.
    pub fn expires_at(&self, key: &CacheKey) -> Option<OffsetDateTime> {
        let now = self.clock.now();
        self.lock()
            .get(&slot_key(key))
            .filter(|slot| slot.expires_at > now)
            .map(|slot| slot.expires_at)
    }

    /// Number of entries, live or not yet swept.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn slot_key(key: &CacheKey) -> String {
    format!("{}:{key}", key.namespace())
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let k = slot_key(key);
        match entries.get(&k) {
            Some(slot) if slot.expires_at > now => Ok(Some(slot.value.clone())),
            Some(_) => {
                entries.remove(&k);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &CacheKey, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = self.clock.deadline(ttl);
        self.lock().insert(
            slot_key(key),
            Slot {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn touch(&self, key: &CacheKey, ttl: Duration) -> Result<bool, CacheError> {
        let now = self.clock.now();
        match self.lock().get_mut(&slot_key(key)) {
            Some(slot) if slot.expires_at > now => {
                slot.expires_at = self.clock.deadline(ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let now = self.clock.now();
        let entries = self.lock();
        let live = entries.values().filter(|slot| slot.expires_at > now);
        Ok(live.fold(CacheStats::default(), |mut acc, slot| {
            acc.entries += 1;
            acc.total_bytes += slot.value.len() as u64;
            acc
        }))
    }

    async fn clear(&self) -> Result<CacheStats, CacheError> {
        let stats = self.stats().await?;
        self.lock().clear();
        Ok(stats)
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
