//! The engine: one executor, one dialect, an optional cache.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quarry_query::prelude::*;
//!
//! # fn demo(executor: Arc<dyn Executor>) -> QueryResult<()> {
//! let engine = Engine::builder(executor)
//!     .config(EngineConfig::from_env()?)
//!     .dialect(Dialect::MySQL)
//!     .cache(Arc::new(MemoryCache::default()))
//!     .build();
//!
//! let users = engine.table("users")?.where_eq("active", true)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::builder::QueryBuilder;
use crate::cache::{CacheAdapter, CacheApi};
use crate::config::EngineConfig;
use crate::crypto::FieldDecryptor;
use crate::dialect::{Dialect, DialectProfile};
use crate::error::QueryResult;
use crate::executor::Executor;

/// Collaborators shared by every builder an engine hands out.
pub(crate) struct EngineInner {
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) dialect: Arc<dyn DialectProfile>,
    pub(crate) cache: Option<Arc<CacheApi>>,
    pub(crate) decryptor: Option<Arc<dyn FieldDecryptor>>,
    pub(crate) config: EngineConfig,
}

/// Entry point for building queries against one database.
///
/// Cheap to clone; clones share the executor and the cache.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("dialect", &self.inner.dialect.name())
            .field("cache", &self.inner.cache.as_ref().map(|c| c.adapter().name()))
            .field("decryptor", &self.inner.decryptor.is_some())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Engine {
    /// Start configuring an engine around `executor`.
    pub fn builder(executor: Arc<dyn Executor>) -> EngineBuilder {
        EngineBuilder {
            executor,
            config: EngineConfig::default(),
            dialect: None,
            cache: None,
            decryptor: None,
        }
    }

    /// A builder with `FROM name` already set.
    pub fn table(&self, name: &str) -> QueryResult<QueryBuilder> {
        self.query().from(name)
    }

    /// A builder with no table, for raw statements or an explicit `from()`.
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder::new(Arc::clone(&self.inner))
    }

    /// The cache layer, when one is configured.
    pub fn cache_api(&self) -> Option<&Arc<CacheApi>> {
        self.inner.cache.as_ref()
    }

    /// Engine settings.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The dialect statements are compiled for.
    pub fn dialect(&self) -> &dyn DialectProfile {
        self.inner.dialect.as_ref()
    }
}

/// Configures an [`Engine`].
pub struct EngineBuilder {
    executor: Arc<dyn Executor>,
    config: EngineConfig,
    dialect: Option<Arc<dyn DialectProfile>>,
    cache: Option<Arc<dyn CacheAdapter>>,
    decryptor: Option<Arc<dyn FieldDecryptor>>,
}

impl EngineBuilder {
    /// Replace the settings. The dialect named here is used unless
    /// `dialect()` or `dialect_profile()` is also called.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a built-in dialect.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.config.dialect = dialect;
        self.dialect = None;
        self
    }

    /// Use a custom dialect profile.
    pub fn dialect_profile(mut self, profile: Arc<dyn DialectProfile>) -> Self {
        self.dialect = Some(profile);
        self
    }

    /// Cache reads in `adapter`, keyed and indexed per the cache settings.
    pub fn cache(mut self, adapter: Arc<dyn CacheAdapter>) -> Self {
        self.cache = Some(adapter);
        self
    }

    /// Decrypt marked fields with `decryptor`.
    pub fn decryptor(mut self, decryptor: Arc<dyn FieldDecryptor>) -> Self {
        self.decryptor = Some(decryptor);
        self
    }

    /// Finish configuration.
    pub fn build(self) -> Engine {
        let dialect = self
            .dialect
            .unwrap_or_else(|| Arc::new(self.config.dialect) as Arc<dyn DialectProfile>);
        let cache = self
            .cache
            .map(|adapter| Arc::new(CacheApi::new(adapter, self.config.cache.clone())));
        debug!(
            dialect = dialect.name(),
            cache = cache.as_ref().map(|c| c.adapter().name()),
            "engine built"
        );
        Engine {
            inner: Arc::new(EngineInner {
                executor: self.executor,
                dialect,
                cache,
                decryptor: self.decryptor,
                config: self.config,
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::executor::{BoxFuture, ExecOutput, QueryOutput};
    use crate::value::SqlValue;

    /// Answers every call with nothing.
    pub(crate) struct NullExecutor;

    impl Executor for NullExecutor {
        fn query<'a>(&'a self, _sql: &'a str, _bindings: &'a [SqlValue]) -> BoxFuture<'a, QueryResult<QueryOutput>> {
            Box::pin(async { Ok(QueryOutput::default()) })
        }

        fn execute<'a>(&'a self, _sql: &'a str, _bindings: &'a [SqlValue]) -> BoxFuture<'a, QueryResult<ExecOutput>> {
            Box::pin(async { Ok(ExecOutput::default()) })
        }
    }

    pub(crate) fn engine() -> Engine {
        engine_for(Dialect::PostgreSQL)
    }

    pub(crate) fn engine_for(dialect: Dialect) -> Engine {
        Engine::builder(Arc::new(NullExecutor)).dialect(dialect).build()
    }

    #[test]
    fn test_table_sets_from() {
        let q = engine().table("users").unwrap();
        assert_eq!(q.to_sql().unwrap().sql, "SELECT * FROM \"users\"");
        assert!(engine().table("users; DROP TABLE x").is_err());
    }

    #[test]
    fn test_cache_is_optional() {
        assert!(engine().cache_api().is_none());
        let cached = Engine::builder(Arc::new(NullExecutor))
            .cache(Arc::new(MemoryCache::default()))
            .build();
        assert_eq!(cached.cache_api().map(|c| c.adapter().name()), Some("memory"));
    }

    #[test]
    fn test_dialect_selection() {
        let e = Engine::builder(Arc::new(NullExecutor))
            .config(EngineConfig::default().with_dialect(Dialect::MSSQL))
            .build();
        assert_eq!(e.dialect().name(), Dialect::MSSQL.name());

        let e = Engine::builder(Arc::new(NullExecutor))
            .dialect_profile(Arc::new(Dialect::SQLite))
            .dialect(Dialect::MySQL)
            .build();
        assert_eq!(e.dialect().name(), Dialect::MySQL.name());
    }
}
