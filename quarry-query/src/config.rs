//! Engine and cache configuration.
//!
//! Values come from code or from the environment:
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `QUARRY_DIALECT` | [`EngineConfig::dialect`] | `postgresql` |
//! | `QUARRY_DEFAULT_PER_PAGE` | [`EngineConfig::default_per_page`] | `15` |
//! | `QUARRY_AGGREGATES_USE_CACHE` | [`EngineConfig::aggregates_use_cache`] | `false` |
//! | `QUARRY_CACHE_TTL_SECS` | [`CacheConfig::default_ttl`] | `300` |
//! | `QUARRY_CACHE_PREFIX` | [`CacheConfig::key_prefix`] | `quarry:` |
//! | `QUARRY_CACHE_EMPTY` | [`CacheConfig::cache_empty_results`] | `false` |
//! | `QUARRY_CACHE_SELECT_ONLY` | [`CacheConfig::select_only`] | `true` |
//! | `QUARRY_CACHE_INVALIDATE_ON_WRITE` | [`CacheConfig::invalidate_on_write`] | `true` |

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::dialect::Dialect;
use crate::error::{QueryError, QueryResult};

/// Source for environment variables.
pub trait EnvSource: Send + Sync {
    /// Get an environment variable value.
    fn get(&self, name: &str) -> Option<String>;
}

/// Environment source using `std::env`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Environment source backed by a map, for tests.
#[derive(Debug, Clone, Default)]
pub struct MapEnvSource {
    vars: HashMap<String, String>,
}

impl MapEnvSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl EnvSource for MapEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Settings for the cache layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL used when a query does not set one.
    pub default_ttl: Duration,
    /// Prefix of every derived key.
    pub key_prefix: String,
    /// Hex digits of the SHA-256 digest kept in derived keys.
    pub key_hash_len: usize,
    /// Whether empty result sets are stored.
    pub cache_empty_results: bool,
    /// Only store results of SELECT/WITH statements.
    pub select_only: bool,
    /// Sweep keys by glob during invalidation when the adapter supports it.
    pub pattern_invalidation: bool,
    /// Invalidate the written table after `execute()`.
    pub invalidate_on_write: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            key_prefix: "quarry:".to_string(),
            key_hash_len: 32,
            cache_empty_results: false,
            select_only: true,
            pattern_invalidation: true,
            invalidate_on_write: true,
        }
    }
}

impl CacheConfig {
    /// Load from the process environment.
    pub fn from_env() -> QueryResult<Self> {
        Self::from_source(&StdEnvSource)
    }

    /// Load from an arbitrary environment source.
    pub fn from_source(env: &dyn EnvSource) -> QueryResult<Self> {
        let mut config = Self::default();
        if let Some(secs) = parse_var::<u64>(env, "QUARRY_CACHE_TTL_SECS")? {
            if secs == 0 {
                return Err(QueryError::invalid_configuration(
                    "QUARRY_CACHE_TTL_SECS must be greater than zero",
                ));
            }
            config.default_ttl = Duration::from_secs(secs);
        }
        if let Some(prefix) = env.get("QUARRY_CACHE_PREFIX") {
            config.key_prefix = prefix;
        }
        if let Some(v) = parse_bool(env, "QUARRY_CACHE_EMPTY")? {
            config.cache_empty_results = v;
        }
        if let Some(v) = parse_bool(env, "QUARRY_CACHE_SELECT_ONLY")? {
            config.select_only = v;
        }
        if let Some(v) = parse_bool(env, "QUARRY_CACHE_INVALIDATE_ON_WRITE")? {
            config.invalidate_on_write = v;
        }
        Ok(config)
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Store empty result sets too.
    pub fn cache_empty_results(mut self, enabled: bool) -> Self {
        self.cache_empty_results = enabled;
        self
    }

    /// Toggle invalidation after writes.
    pub fn invalidate_on_write(mut self, enabled: bool) -> Self {
        self.invalidate_on_write = enabled;
        self
    }
}

/// Settings for an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// SQL dialect of the target database.
    pub dialect: Dialect,
    /// Page size used when `paginate` receives one below 1.
    pub default_per_page: u64,
    /// Route aggregates through the cache when `cache()` was called.
    pub aggregates_use_cache: bool,
    /// Cache settings.
    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            default_per_page: 15,
            aggregates_use_cache: false,
            cache: CacheConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from the process environment.
    pub fn from_env() -> QueryResult<Self> {
        Self::from_source(&StdEnvSource)
    }

    /// Load from an arbitrary environment source.
    pub fn from_source(env: &dyn EnvSource) -> QueryResult<Self> {
        let mut config = Self {
            cache: CacheConfig::from_source(env)?,
            ..Self::default()
        };
        if let Some(dialect) = parse_var::<Dialect>(env, "QUARRY_DIALECT")? {
            config.dialect = dialect;
        }
        if let Some(per_page) = parse_var::<u64>(env, "QUARRY_DEFAULT_PER_PAGE")? {
            if per_page == 0 {
                return Err(QueryError::invalid_configuration(
                    "QUARRY_DEFAULT_PER_PAGE must be at least 1",
                ));
            }
            config.default_per_page = per_page;
        }
        if let Some(v) = parse_bool(env, "QUARRY_AGGREGATES_USE_CACHE")? {
            config.aggregates_use_cache = v;
        }
        Ok(config)
    }

    /// Set the dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the fallback page size.
    pub fn with_default_per_page(mut self, per_page: u64) -> Self {
        self.default_per_page = per_page.max(1);
        self
    }

    /// Route aggregates through the cache.
    pub fn aggregates_use_cache(mut self, enabled: bool) -> Self {
        self.aggregates_use_cache = enabled;
        self
    }

    /// Replace the cache settings.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}

fn parse_var<T>(env: &dyn EnvSource, name: &str) -> QueryResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env.get(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            QueryError::invalid_configuration(format!("{}={:?} is invalid: {}", name, raw, e))
        }),
    }
}

fn parse_bool(env: &dyn EnvSource, name: &str) -> QueryResult<Option<bool>> {
    match env.get(name) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(QueryError::invalid_configuration(format!(
                "{}={:?} is not a boolean",
                name, raw
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.dialect, Dialect::PostgreSQL);
        assert_eq!(config.default_per_page, 15);
        assert!(!config.aggregates_use_cache);
        assert_eq!(config.cache.default_ttl, Duration::from_secs(300));
        assert_eq!(config.cache.key_prefix, "quarry:");
    }

    #[test]
    fn test_from_source() {
        let env = MapEnvSource::new()
            .set("QUARRY_DIALECT", "mysql")
            .set("QUARRY_DEFAULT_PER_PAGE", "25")
            .set("QUARRY_AGGREGATES_USE_CACHE", "yes")
            .set("QUARRY_CACHE_TTL_SECS", "60")
            .set("QUARRY_CACHE_PREFIX", "app:")
            .set("QUARRY_CACHE_INVALIDATE_ON_WRITE", "off");

        let config = EngineConfig::from_source(&env).unwrap();
        assert_eq!(config.dialect, Dialect::MySQL);
        assert_eq!(config.default_per_page, 25);
        assert!(config.aggregates_use_cache);
        assert_eq!(config.cache.default_ttl, Duration::from_secs(60));
        assert_eq!(config.cache.key_prefix, "app:");
        assert!(!config.cache.invalidate_on_write);
    }

    #[test]
    fn test_malformed_values() {
        for (name, value) in [
            ("QUARRY_DIALECT", "oracle"),
            ("QUARRY_DEFAULT_PER_PAGE", "ten"),
            ("QUARRY_DEFAULT_PER_PAGE", "0"),
            ("QUARRY_CACHE_TTL_SECS", "-5"),
            ("QUARRY_CACHE_EMPTY", "maybe"),
        ] {
            let env = MapEnvSource::new().set(name, value);
            let err = EngineConfig::from_source(&env).unwrap_err();
            assert_eq!(err.code, crate::error::ErrorCode::InvalidConfiguration, "{name}={value}");
        }
    }
}
