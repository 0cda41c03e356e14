//! In-process cache adapter.
//!
//! Entries expire on read once their TTL passes. When the store is full the
//! expired entries go first, then the oldest live one. Time comes from
//! `tokio::time`, so paused-clock tests can drive expiry.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;

use super::backend::{CacheAdapter, CacheResult};
use super::key::KeyPattern;

/// Configuration for the in-memory cache.
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries.
    pub max_capacity: usize,
    /// TTL applied when `set` receives none.
    pub default_ttl: Option<Duration>,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            default_ttl: None,
        }
    }
}

/// Builder for [`MemoryCache`].
#[derive(Debug, Default)]
pub struct MemoryCacheBuilder {
    config: MemoryCacheConfig,
}

impl MemoryCacheBuilder {
    /// Set max capacity.
    pub fn max_capacity(mut self, capacity: usize) -> Self {
        self.config.max_capacity = capacity.max(1);
        self
    }

    /// Set the fallback TTL.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = Some(ttl);
        self
    }

    /// Build the cache.
    pub fn build(self) -> MemoryCache {
        MemoryCache::new(self.config)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    created_at: Instant,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: serde_json::Value, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            expires_at: ttl.map(|d| now + d),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// A [`CacheAdapter`] backed by a locked `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryCache {
    config: MemoryCacheConfig,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    /// Create a cache with the given config.
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Create a builder.
    pub fn builder() -> MemoryCacheBuilder {
        MemoryCacheBuilder::default()
    }

    /// Number of stored entries, expired ones included until they are
    /// evicted.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop expired entries and return how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    fn make_room(&self, entries: &mut HashMap<String, CacheEntry>) {
        let now = Instant::now();
        entries.retain(|_, e| !e.is_expired(now));
        while entries.len() >= self.config.max_capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl CacheAdapter for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<serde_json::Value>> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        self.entries.write().remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) -> CacheResult<()> {
        let entry = CacheEntry::new(value, ttl.or(self.config.default_ttl));
        let mut entries = self.entries.write();
        if !entries.contains_key(key) && entries.len() >= self.config.max_capacity {
            self.make_room(&mut entries);
        }
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .get(key)
            .is_some_and(|e| !e.is_expired(now)))
    }

    async fn keys(&self, pattern: Option<&KeyPattern>) -> CacheResult<Vec<String>> {
        let now = Instant::now();
        let entries = self.entries.read();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .filter(|(k, _)| pattern.is_none_or(|p| p.matches(k)))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn clear(&self) -> CacheResult<()> {
        self.entries.write().clear();
        Ok(())
    }

    fn supports_pattern_scan(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
