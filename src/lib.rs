//! # Quarry
//!
//! Cross-dialect, injection-safe SQL construction and execution with result
//! caching.
//!
//! Quarry provides:
//! - A fluent query builder that keeps every value out of the SQL text
//! - Placeholder and quoting rules for PostgreSQL, MySQL, SQLite and SQL Server
//! - Aggregates, chunked and streamed reads, offset and cursor pagination
//! - A read-through cache with table and tag invalidation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quarry::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> QueryResult<()> {
//!     let engine = Engine::builder(Arc::new(MyDriver::connect().await?))
//!         .config(EngineConfig::from_env()?)
//!         .cache(Arc::new(MemoryCache::default()))
//!         .build();
//!
//!     let page = engine
//!         .table("users")?
//!         .where_eq("active", true)?
//!         .latest("created_at")?
//!         .paginate(1, 25)
//!         .await?;
//!
//!     println!("{} users", page.pagination.total);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Query building, execution and caching.
pub mod query {
    pub use quarry_query::*;
}

pub use quarry_query::{
    Dialect, Engine, EngineConfig, Executor, QueryBuilder, QueryError, QueryResult, SqlValue,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use quarry_query::prelude::*;
}
