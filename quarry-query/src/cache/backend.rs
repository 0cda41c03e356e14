//! Cache adapter trait and error types.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::key::KeyPattern;

/// Errors raised at the cache-adapter boundary.
///
/// These never fail a query: the cache layer logs them and falls back to a
/// miss or skips the store.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Value could not be encoded for storage.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored value could not be decoded.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Backing store is unreachable.
    #[error("connection error: {0}")]
    Connection(String),

    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// Backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// Operation not supported by this adapter.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// A key/value store the cache layer can sit on.
///
/// Values are JSON documents. Implementations are shared across builders and
/// must do their own synchronization.
#[async_trait]
pub trait CacheAdapter: Send + Sync {
    /// Fetch a live entry.
    async fn get(&self, key: &str) -> CacheResult<Option<serde_json::Value>>;

    /// Store an entry. `None` means no expiry.
    async fn set(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) -> CacheResult<()>;

    /// Remove an entry, returning whether it existed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Whether a live entry exists.
    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// List live keys, optionally filtered by a glob pattern.
    async fn keys(&self, pattern: Option<&KeyPattern>) -> CacheResult<Vec<String>>;

    /// Drop every entry.
    async fn clear(&self) -> CacheResult<()>;

    /// Whether [`keys`](Self::keys) with a pattern is cheap enough to use
    /// during invalidation.
    fn supports_pattern_scan(&self) -> bool {
        false
    }

    /// Adapter name for log output.
    fn name(&self) -> &'static str {
        "cache"
    }
}
