//! Per-query cache options.

use std::time::Duration;

use crate::error::{QueryError, QueryResult};

/// Options accepted by `QueryBuilder::cache`.
///
/// A bare [`Duration`] converts into options with only a TTL.
///
/// ```rust
/// use quarry_query::cache::CacheOptions;
/// use std::time::Duration;
///
/// let opts = CacheOptions::ttl(Duration::from_secs(60))
///     .with_key("dashboard:totals")
///     .with_tag("reports");
/// assert!(opts.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Entry lifetime; the cache default applies when `None`.
    pub ttl: Option<Duration>,
    /// Explicit cache key.
    pub key: Option<String>,
    /// Extra invalidation tags.
    pub tags: Vec<String>,
}

impl CacheOptions {
    /// Options with a specific TTL.
    pub fn ttl(duration: Duration) -> Self {
        Self {
            ttl: Some(duration),
            ..Default::default()
        }
    }

    /// Set the TTL.
    pub fn with_ttl(mut self, duration: Duration) -> Self {
        self.ttl = Some(duration);
        self
    }

    /// Use an explicit key instead of the derived one.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add multiple tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Reject zero TTLs, blank keys and blank tags.
    pub fn validate(&self) -> QueryResult<()> {
        if self.ttl == Some(Duration::ZERO) {
            return Err(QueryError::invalid_cache_options("TTL must be greater than zero"));
        }
        if let Some(key) = &self.key {
            if key.trim().is_empty() {
                return Err(QueryError::invalid_cache_options("cache key must not be empty"));
            }
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(QueryError::invalid_cache_options("cache tags must not be empty"));
        }
        Ok(())
    }
}

impl From<Duration> for CacheOptions {
    fn from(ttl: Duration) -> Self {
        Self::ttl(ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_duration() {
        let opts: CacheOptions = Duration::from_secs(5).into();
        assert_eq!(opts.ttl, Some(Duration::from_secs(5)));
        assert!(opts.key.is_none());
    }

    #[test]
    fn test_validate() {
        assert!(CacheOptions::default().validate().is_ok());
        assert!(CacheOptions::ttl(Duration::ZERO).validate().unwrap_err().is_validation());
        assert!(CacheOptions::default().with_key("  ").validate().is_err());
        assert!(CacheOptions::default().with_tags(["ok", ""]).validate().is_err());
    }
}
