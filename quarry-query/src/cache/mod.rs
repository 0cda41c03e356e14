//! Result caching for compiled queries.
//!
//! The cache layer sits between a builder's terminal call and the executor:
//!
//! ```text
//! ┌────────────┐   key = sha256(sql ++ bindings)   ┌──────────────┐
//! │ QueryBuilder│ ───────────────────────────────► │   CacheApi   │
//! └────────────┘                                   │ tables / tags│
//!        │ miss                                     │    index     │
//!        ▼                                          └──────┬───────┘
//! ┌────────────┐                                          │
//! │  Executor  │                                   ┌──────▼───────┐
//! └────────────┘                                   │ CacheAdapter │
//!                                                  └──────────────┘
//! ```
//!
//! Adapter failures are logged and treated as a miss (on read) or a skipped
//! store (on write). A cache outage never fails a query.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quarry_query::cache::{CacheApi, Invalidation, MemoryCache};
//! use quarry_query::config::CacheConfig;
//!
//! # async fn demo() {
//! let api = CacheApi::new(Arc::new(MemoryCache::default()), CacheConfig::default());
//! api.set("greeting", &"hello", None).await;
//! assert_eq!(api.get::<String>("greeting").await.as_deref(), Some("hello"));
//!
//! api.invalidate(&Invalidation::tables(["users"])).await;
//! println!("{}", api.get_stats());
//! # }
//! ```

pub mod backend;
pub mod index;
pub mod key;
pub mod memory;
pub mod options;
pub mod stats;

pub use backend::{CacheAdapter, CacheError, CacheResult};
pub use index::KeyIndex;
pub use key::{KeyPattern, generate_key, referenced_tables};
pub use memory::{MemoryCache, MemoryCacheBuilder, MemoryCacheConfig};
pub use options::CacheOptions;
pub use stats::CacheApiStats;

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::builder::{CacheDirective, CompiledQuery, QueryBuilder};
use crate::config::CacheConfig;
use crate::error::QueryResult;
use crate::executor::QueryOutput;
use crate::value::SqlValue;
use stats::CacheCounters;

/// What to evict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    /// Table names.
    pub tables: Vec<String>,
    /// Tag names.
    pub tags: Vec<String>,
}

impl Invalidation {
    /// Invalidate by table.
    pub fn tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(Into::into).collect(),
            tags: Vec::new(),
        }
    }

    /// Invalidate by tag.
    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: Vec::new(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Add tags to a table invalidation.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Whether there is nothing to invalidate.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.tags.is_empty()
    }
}

/// Standalone cache management: read-through for builders, explicit
/// get/set, invalidation and statistics.
pub struct CacheApi {
    adapter: Arc<dyn CacheAdapter>,
    config: CacheConfig,
    tables: KeyIndex,
    tags: KeyIndex,
    counters: CacheCounters,
}

impl std::fmt::Debug for CacheApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheApi")
            .field("adapter", &self.adapter.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CacheApi {
    /// Wrap an adapter.
    pub fn new(adapter: Arc<dyn CacheAdapter>, config: CacheConfig) -> Self {
        Self {
            adapter,
            config,
            tables: KeyIndex::new(),
            tags: KeyIndex::new(),
            counters: CacheCounters::default(),
        }
    }

    /// The underlying adapter.
    pub fn adapter(&self) -> &Arc<dyn CacheAdapter> {
        &self.adapter
    }

    /// Active configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Table → keys index.
    pub fn table_index(&self) -> &KeyIndex {
        &self.tables
    }

    /// Tag → keys index.
    pub fn tag_index(&self) -> &KeyIndex {
        &self.tags
    }

    /// Derive the key for a compiled statement.
    pub fn generate_key(&self, sql: &str, bindings: &[SqlValue]) -> String {
        generate_key(&self.config.key_prefix, sql, bindings, self.config.key_hash_len)
    }

    /// Scope a caller-supplied key to one derived statement.
    pub fn scoped_key(&self, key: &str, compiled: &CompiledQuery) -> String {
        generate_key(
            &format!("{}:", key),
            &compiled.sql,
            &compiled.bindings,
            self.config.key_hash_len,
        )
    }

    /// Read a value. Adapter and decode failures read as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.lookup(key).await {
            Some(value) => value,
            None => {
                self.forget(key);
                self.counters.record_miss();
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(decoded) => {
                self.counters.record_hit();
                Some(decoded)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cached value has an unexpected shape");
                self.counters.record_miss();
                None
            }
        }
    }

    /// Store a value. Returns whether the adapter accepted it.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "value is not cacheable");
                return false;
            }
        };
        self.store(key, value, ttl).await
    }

    /// Delete a key. Adapter failures read as "not deleted".
    pub async fn delete(&self, key: &str) -> bool {
        self.forget(key);
        match self.adapter.delete(key).await {
            Ok(deleted) => {
                if deleted {
                    self.counters.record_deletes(1);
                }
                deleted
            }
            Err(e) => {
                warn!(key = %key, error = %e, adapter = self.adapter.name(), "cache delete failed");
                false
            }
        }
    }

    /// Whether a live entry exists. Adapter failures read as absent.
    pub async fn exists(&self, key: &str) -> bool {
        match self.adapter.exists(key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(key = %key, error = %e, adapter = self.adapter.name(), "cache exists check failed");
                false
            }
        }
    }

    /// Evict every key indexed under the given tables and tags.
    ///
    /// Adapters that support pattern scans are additionally swept for
    /// caller-supplied keys carrying a name as a `:`-separated segment.
    /// Derived `query:` keys are reached through the index only. Index entries are dropped whether or not the
    /// deletions succeed. Returns the number of keys actually deleted.
    pub async fn invalidate(&self, target: &Invalidation) -> usize {
        self.counters.record_invalidation();
        let mut keys: BTreeSet<String> = BTreeSet::new();
        for table in &target.tables {
            keys.extend(self.tables.take(table));
        }
        for tag in &target.tags {
            keys.extend(self.tags.take(tag));
        }

        if self.config.pattern_invalidation && self.adapter.supports_pattern_scan() {
            for name in target.tables.iter().chain(&target.tags) {
                let pattern = KeyPattern::mentioning(&self.config.key_prefix, &name.to_lowercase());
                match self.adapter.keys(Some(&pattern)).await {
                    Ok(found) => keys.extend(
                        found
                            .into_iter()
                            .filter(|key| names_segment(key, &self.config.key_prefix, name)),
                    ),
                    Err(e) => warn!(pattern = %pattern, error = %e, "pattern scan failed"),
                }
            }
        }

        let mut deleted = 0usize;
        for key in &keys {
            self.forget(key);
            match self.adapter.delete(key).await {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => warn!(key = %key, error = %e, "cache delete failed during invalidation"),
            }
        }
        self.counters.record_deletes(deleted as u64);
        debug!(
            tables = ?target.tables,
            tags = ?target.tags,
            deleted,
            "cache invalidated"
        );
        deleted
    }

    /// Drop every entry and both indices.
    pub async fn clear(&self) -> CacheResult<()> {
        self.tables.clear();
        self.tags.clear();
        self.adapter.clear().await
    }

    /// Run each query and store its result, ignoring cached copies.
    ///
    /// Builders without a cache directive use the default TTL. Returns the
    /// number of results stored; executor errors surface.
    pub async fn warmup(&self, queries: &[QueryBuilder]) -> QueryResult<usize> {
        let mut stored = 0;
        for query in queries {
            let compiled = query.to_sql()?;
            let output = query.run_query(&compiled).await?;
            if self.store_output(&compiled, query.cache_directive(), &output).await {
                stored += 1;
            }
        }
        debug!(stored, total = queries.len(), "cache warmed");
        Ok(stored)
    }

    /// Current counters.
    pub fn get_stats(&self) -> CacheApiStats {
        self.counters.snapshot()
    }

    /// Zero the counters.
    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    /// Serve `compiled` from the cache, or run `fetch` and store its result.
    pub(crate) async fn read_through<F, Fut>(
        &self,
        compiled: &CompiledQuery,
        directive: &CacheDirective,
        fetch: F,
    ) -> QueryResult<QueryOutput>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = QueryResult<QueryOutput>>,
    {
        let key = self.key_for(compiled, directive);
        match self.lookup(&key).await {
            Some(value) => match serde_json::from_value::<QueryOutput>(value) {
                Ok(output) => {
                    self.counters.record_hit();
                    debug!(key = %key, rows = output.rows.len(), "cache hit");
                    return Ok(output);
                }
                Err(e) => warn!(key = %key, error = %e, "cached result has an unexpected shape"),
            },
            // Expired or evicted by the adapter; stop indexing it.
            None => self.forget(&key),
        }
        self.counters.record_miss();
        debug!(key = %key, "cache miss");

        let output = fetch().await?;
        self.store_output(compiled, directive, &output).await;
        Ok(output)
    }

    fn key_for(&self, compiled: &CompiledQuery, directive: &CacheDirective) -> String {
        directive
            .key
            .clone()
            .unwrap_or_else(|| self.generate_key(&compiled.sql, &compiled.bindings))
    }

    async fn store_output(&self, compiled: &CompiledQuery, directive: &CacheDirective, output: &QueryOutput) -> bool {
        if self.config.select_only && !is_read_statement(&compiled.sql) {
            return false;
        }
        if output.rows.is_empty() && !self.config.cache_empty_results {
            return false;
        }
        let key = self.key_for(compiled, directive);
        let value = match serde_json::to_value(output) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "result is not cacheable");
                return false;
            }
        };
        if !self.store(&key, value, directive.ttl).await {
            return false;
        }
        for table in referenced_tables(&compiled.sql) {
            self.tables.insert(&table, &key);
        }
        for tag in &directive.tags {
            self.tags.insert(tag, &key);
        }
        true
    }

    fn forget(&self, key: &str) {
        self.tables.forget_key(key);
        self.tags.forget_key(key);
    }

    async fn lookup(&self, key: &str) -> Option<serde_json::Value> {
        match self.adapter.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, adapter = self.adapter.name(), "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn store(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) -> bool {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        match self.adapter.set(key, value, Some(ttl)).await {
            Ok(()) => {
                self.counters.record_set();
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, adapter = self.adapter.name(), "cache write failed, skipping");
                false
            }
        }
    }
}

fn is_read_statement(sql: &str) -> bool {
    let head = sql.trim_start();
    ["SELECT", "WITH"].iter().any(|kw| {
        head.get(..kw.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(kw))
    })
}

/// Whether `key` carries `name` as a whole segment ahead of any derived
/// `query:` part.
fn names_segment(key: &str, prefix: &str, name: &str) -> bool {
    key.strip_prefix(prefix).is_some_and(|rest| {
        rest.split(':')
            .take_while(|segment| *segment != "query")
            .any(|segment| segment.eq_ignore_ascii_case(name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct BrokenAdapter;

    #[async_trait]
    impl CacheAdapter for BrokenAdapter {
        async fn get(&self, _key: &str) -> CacheResult<Option<serde_json::Value>> {
            Err(CacheError::Connection("refused".into()))
        }

        async fn set(&self, _key: &str, _value: serde_json::Value, _ttl: Option<Duration>) -> CacheResult<()> {
            Err(CacheError::Connection("refused".into()))
        }

        async fn delete(&self, _key: &str) -> CacheResult<bool> {
            Err(CacheError::Timeout)
        }

        async fn keys(&self, _pattern: Option<&KeyPattern>) -> CacheResult<Vec<String>> {
            Err(CacheError::Unsupported("keys"))
        }

        async fn clear(&self) -> CacheResult<()> {
            Err(CacheError::Timeout)
        }
    }

    fn memory_api() -> CacheApi {
        CacheApi::new(Arc::new(MemoryCache::default()), CacheConfig::default())
    }

    fn compiled(sql: &str) -> CompiledQuery {
        CompiledQuery {
            sql: sql.to_string(),
            bindings: vec![SqlValue::Int(1)],
        }
    }

    fn one_row() -> QueryOutput {
        let mut row = crate::value::Row::new();
        row.insert("id".into(), serde_json::json!(1));
        QueryOutput::from_rows(vec![row])
    }

    #[tokio::test]
    async fn test_get_set_delete() {
        let api = memory_api();
        assert!(api.set("k", &vec![1, 2, 3], None).await);
        assert_eq!(api.get::<Vec<i32>>("k").await, Some(vec![1, 2, 3]));
        assert!(api.exists("k").await);
        assert!(api.delete("k").await);
        assert_eq!(api.get::<Vec<i32>>("k").await, None);

        let stats = api.get_stats();
        assert_eq!((stats.hits, stats.misses, stats.sets, stats.deletes), (1, 1, 1, 1));
        api.reset_stats();
        assert_eq!(api.get_stats(), CacheApiStats::default());
    }

    #[tokio::test]
    async fn test_read_through_indexes_tables_and_tags() {
        let api = memory_api();
        let q = compiled("SELECT * FROM \"users\" WHERE \"id\" = $1");
        let directive = CacheDirective {
            enabled: true,
            tags: vec!["profile".into()],
            ..Default::default()
        };

        let out = api.read_through(&q, &directive, || async { Ok(one_row()) }).await.unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(api.table_index().keys_for("users").len(), 1);
        assert_eq!(api.tag_index().keys_for("profile").len(), 1);

        // Second read is served without calling fetch.
        let again = api
            .read_through(&q, &directive, || async {
                Err(crate::error::QueryError::internal("should not run"))
            })
            .await
            .unwrap();
        assert_eq!(again, out);
        assert_eq!(api.get_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_empty_and_write_results_are_not_stored() {
        let api = memory_api();
        let directive = CacheDirective::default();
        api.read_through(&compiled("SELECT * FROM t"), &directive, || async { Ok(QueryOutput::default()) })
            .await
            .unwrap();
        api.read_through(&compiled("DELETE FROM t RETURNING *"), &directive, || async { Ok(one_row()) })
            .await
            .unwrap();
        assert_eq!(api.get_stats().sets, 0);
    }

    #[tokio::test]
    async fn test_invalidate_clears_index_and_entries() {
        let api = memory_api();
        let users = compiled("SELECT * FROM users");
        let orders = compiled("SELECT * FROM orders");
        let d = CacheDirective::default();
        api.read_through(&users, &d, || async { Ok(one_row()) }).await.unwrap();
        api.read_through(&orders, &d, || async { Ok(one_row()) }).await.unwrap();

        let deleted = api.invalidate(&Invalidation::tables(["USERS"])).await;
        assert_eq!(deleted, 1);
        assert!(api.table_index().keys_for("users").is_empty());
        assert!(!api.exists(&api.generate_key(&users.sql, &users.bindings)).await);
        assert!(api.exists(&api.generate_key(&orders.sql, &orders.bindings)).await);
        assert_eq!(api.get_stats().invalidations, 1);
    }

    #[tokio::test]
    async fn test_sweep_leaves_derived_keys_alone() {
        let api = memory_api();
        let orders = compiled("SELECT * FROM \"orders\"");
        api.read_through(&orders, &CacheDirective::default(), || async { Ok(one_row()) })
            .await
            .unwrap();
        assert!(api.set("quarry:users:list", &1, None).await);

        for name in ["query", "e", "a", "quarry"] {
            assert_eq!(api.invalidate(&Invalidation::tables([name])).await, 0, "{}", name);
        }
        assert!(api.exists(&api.generate_key(&orders.sql, &orders.bindings)).await);

        assert_eq!(api.invalidate(&Invalidation::tables(["users"])).await, 1);
        assert!(!api.exists("quarry:users:list").await);
    }

    #[test]
    fn test_names_segment() {
        assert!(names_segment("quarry:users:list", "quarry:", "users"));
        assert!(names_segment("quarry:Users", "quarry:", "users"));
        assert!(!names_segment("quarry:query:abc123", "quarry:", "query"));
        assert!(!names_segment("quarry:superusers", "quarry:", "users"));
        assert!(!names_segment("quarry:all:query:users", "quarry:", "users"));
        assert!(!names_segment("other:users", "quarry:", "users"));
    }

    #[test]
    fn test_scoped_key_differs_per_statement() {
        let api = memory_api();
        let a = api.scoped_key("users:all", &compiled("SELECT * FROM users LIMIT 3 OFFSET 0"));
        let b = api.scoped_key("users:all", &compiled("SELECT * FROM users LIMIT 3 OFFSET 3"));
        assert_ne!(a, b);
        assert!(a.starts_with("users:all:query:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_leave_the_index() {
        let api = memory_api();
        let q = compiled("SELECT * FROM users");
        let directive = CacheDirective {
            enabled: true,
            ttl: Some(Duration::from_secs(1)),
            tags: vec!["people".into()],
            ..Default::default()
        };
        api.read_through(&q, &directive, || async { Ok(one_row()) }).await.unwrap();
        assert_eq!(api.table_index().keys_for("users").len(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        api.read_through(&q, &directive, || async { Ok(QueryOutput::default()) })
            .await
            .unwrap();
        assert!(api.table_index().is_empty());
        assert!(api.tag_index().is_empty());
    }

    #[tokio::test]
    async fn test_broken_adapter_degrades() {
        let api = CacheApi::new(Arc::new(BrokenAdapter), CacheConfig::default());
        let q = compiled("SELECT * FROM users");
        let out = api
            .read_through(&q, &CacheDirective::default(), || async { Ok(one_row()) })
            .await
            .unwrap();
        assert_eq!(out.rows.len(), 1);
        assert!(!api.set("k", &1, None).await);
        assert_eq!(api.get::<i32>("k").await, None);
        assert!(!api.delete("k").await);
        assert_eq!(api.invalidate(&Invalidation::tables(["users"])).await, 0);
        assert!(api.clear().await.is_err());
    }

    #[test]
    fn test_is_read_statement() {
        assert!(is_read_statement("  select 1"));
        assert!(is_read_statement("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!is_read_statement("UPDATE t SET a = 1"));
        assert!(!is_read_statement("SEL"));
    }
}
