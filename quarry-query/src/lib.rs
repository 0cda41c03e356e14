//! # quarry-query
//!
//! Cross-dialect, injection-safe SQL construction and execution with a
//! result cache.
//!
//! This crate provides:
//! - A fluent [`QueryBuilder`] for SELECT, INSERT, UPDATE, DELETE and raw statements
//! - Identifier and operator guards applied before anything reaches the SQL text
//! - Placeholder rendering for PostgreSQL, MySQL, SQLite and SQL Server
//! - Aggregates, chunked and streamed reads, offset and cursor pagination
//! - A read-through cache with table and tag invalidation
//! - Read-side field decryption
//!
//! ## Building statements
//!
//! Every value travels as a binding; the SQL text only ever holds validated
//! identifiers and placeholders.
//!
//! ```rust,no_run
//! use quarry_query::prelude::*;
//!
//! # fn demo(engine: Engine) -> QueryResult<()> {
//! let compiled = engine
//!     .table("users")?
//!     .select(["id", "email"])?
//!     .where_eq("status", "active")?
//!     .where_between("age", 18, 65)?
//!     .order_by_desc("created_at")?
//!     .limit(20)?
//!     .to_sql()?;
//!
//! // SELECT "id", "email" FROM "users" WHERE "status" = $1 AND "age" BETWEEN $2 AND $3
//! //   ORDER BY "created_at" DESC LIMIT 20
//! assert_eq!(compiled.bindings.len(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Executing
//!
//! The crate never talks to a database itself. Implement [`Executor`] over
//! your driver and hand it to [`Engine::builder`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use quarry_query::prelude::*;
//!
//! # async fn demo(executor: Arc<dyn Executor>) -> QueryResult<()> {
//! let engine = Engine::builder(executor)
//!     .dialect(Dialect::PostgreSQL)
//!     .cache(Arc::new(MemoryCache::default()))
//!     .build();
//!
//! let admins = engine
//!     .table("users")?
//!     .where_eq("role", "admin")?
//!     .cache(CacheOptions::default().with_ttl(Duration::from_secs(60)).with_tag("admins"))?
//!     .get()
//!     .await?;
//!
//! if let Some(cache) = engine.cache_api() {
//!     cache.invalidate(&Invalidation::tables(["users"])).await;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Diagnostics go through `tracing`. Enable the `tracing-subscriber` feature
//! and call [`logging::init`] to install a subscriber driven by
//! `QUARRY_DEBUG` and `QUARRY_LOG_LEVEL`.

pub mod builder;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod executor;
pub mod logging;
pub mod pagination;
pub mod validation;
pub mod value;

pub use builder::{CompiledQuery, IntoSqlDate, JoinType, QueryBuilder, SortOrder};
pub use cache::{
    CacheAdapter, CacheApi, CacheApiStats, CacheError, CacheOptions, CacheResult, Invalidation,
    KeyPattern, MemoryCache, MemoryCacheBuilder, MemoryCacheConfig,
};
pub use config::{CacheConfig, EngineConfig, EnvSource, MapEnvSource, StdEnvSource};
pub use crypto::{DecryptError, FieldDecryptor};
pub use dialect::{Dialect, DialectProfile};
pub use engine::{Engine, EngineBuilder};
pub use error::{ErrorCode, ErrorContext, QueryError, QueryResult};
pub use executor::{BoxFuture, ExecOutput, Executor, QueryOutput};
pub use pagination::{CursorPage, PageInfo, Paginated};
pub use value::{Record, Row, SqlValue};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::builder::{CompiledQuery, IntoSqlDate, JoinType, QueryBuilder, SortOrder};
    pub use crate::cache::{CacheAdapter, CacheApi, CacheOptions, Invalidation, MemoryCache};
    pub use crate::config::{CacheConfig, EngineConfig};
    pub use crate::crypto::FieldDecryptor;
    pub use crate::dialect::{Dialect, DialectProfile};
    pub use crate::engine::Engine;
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::executor::{ExecOutput, Executor, QueryOutput};
    pub use crate::pagination::{CursorPage, Paginated};
    pub use crate::value::{Record, Row, SqlValue};
}
