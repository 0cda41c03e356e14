//! The fluent query builder.
//!
//! A [`QueryBuilder`] owns its [`ClauseState`] and [`CacheDirective`] and
//! borrows the engine's executor, dialect and cache. Mutators validate their
//! input and append to the state; terminals compile a statement and run it.
//!
//! ```rust,no_run
//! # use quarry_query::prelude::*;
//! # async fn demo(engine: Engine) -> QueryResult<()> {
//! let active = engine
//!     .table("users")?
//!     .select(["id", "email"])?
//!     .where_eq("active", true)?
//!     .where_in("role", ["admin", "owner"])?
//!     .order_by_desc("created_at")?
//!     .limit(10)?;
//!
//! let compiled = active.to_sql()?;
//! assert_eq!(compiled.bindings.len(), 3);
//!
//! let rows = active.get().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Methods are grouped by concern across the submodules: projection, joins
//! and ordering in `select`, predicates in `filter`, date predicates in
//! `dates`, writes in `dml`, and the executing terminals in `exec` and
//! `lazy`.

mod compile;
mod dates;
mod dml;
mod exec;
mod filter;
mod lazy;
mod select;
pub mod state;

pub use compile::{CompiledQuery, compile, count_placeholders};
pub use dates::IntoSqlDate;
pub use state::{
    BindingList, CacheDirective, ClauseState, Combinator, JoinSpec, JoinType, OrderBySpec,
    SortOrder, WherePredicate,
};

use std::sync::Arc;

use crate::cache::CacheOptions;
use crate::dialect::DialectProfile;
use crate::engine::EngineInner;
use crate::error::{QueryError, QueryResult};
use crate::validation::{self, Identifier};

/// Accumulates one statement and runs it.
///
/// Cloning deep-copies the clause state, so two clones can diverge from a
/// shared prefix.
#[derive(Clone)]
pub struct QueryBuilder {
    pub(crate) engine: Arc<EngineInner>,
    pub(crate) state: ClauseState,
    cache: CacheDirective,
    decrypt_fields: Vec<String>,
}

impl std::fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("dialect", &self.engine.dialect.name())
            .field("state", &self.state)
            .field("cache", &self.cache)
            .field("decrypt_fields", &self.decrypt_fields)
            .finish()
    }
}

impl QueryBuilder {
    pub(crate) fn new(engine: Arc<EngineInner>) -> Self {
        Self {
            engine,
            state: ClauseState::default(),
            cache: CacheDirective::default(),
            decrypt_fields: Vec::new(),
        }
    }

    /// The accumulated clause state.
    pub fn state(&self) -> &ClauseState {
        &self.state
    }

    /// The current cache directive.
    pub fn cache_directive(&self) -> &CacheDirective {
        &self.cache
    }

    /// Fields marked for read-side decryption.
    pub fn decrypted_fields(&self) -> &[String] {
        &self.decrypt_fields
    }

    /// The dialect statements are compiled for.
    pub fn dialect(&self) -> &dyn DialectProfile {
        self.engine.dialect.as_ref()
    }

    /// Compile the current state. Pure: repeated calls without mutation
    /// return identical results.
    pub fn to_sql(&self) -> QueryResult<CompiledQuery> {
        compile(&self.state, self.dialect())
    }

    /// Read results through the cache.
    ///
    /// A no-op when the engine has no cache configured. Options are still
    /// validated.
    pub fn cache(mut self, options: impl Into<CacheOptions>) -> QueryResult<Self> {
        let options = options.into();
        options.validate()?;
        if self.engine.cache.is_none() {
            return Ok(self);
        }
        self.cache = CacheDirective {
            enabled: true,
            ttl: options.ttl,
            key: options.key,
            tags: options.tags,
        };
        Ok(self)
    }

    /// Stop reading through the cache.
    pub fn no_cache(mut self) -> Self {
        self.cache = CacheDirective::default();
        self
    }

    /// Mark fields whose stored values are ciphertext.
    ///
    /// Marked fields are decrypted after every read; writes are not
    /// transformed.
    pub fn encrypt<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.decrypt(fields)
    }

    /// Mark fields for decryption after every read.
    pub fn decrypt<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            let field = field.into();
            if !self.decrypt_fields.contains(&field) {
                self.decrypt_fields.push(field);
            }
        }
        self
    }

    pub(crate) fn column_sql(&self, name: &str) -> QueryResult<String> {
        Ok(validation::column(name)?.render(self.dialect()))
    }

    pub(crate) fn table_sql(&self, name: &str) -> QueryResult<String> {
        Ok(validation::table(name)?.render(self.dialect()))
    }

    /// Quote a bare alias. Aliases never take the expression escape hatch.
    pub(crate) fn alias_sql(&self, alias: &str) -> QueryResult<String> {
        match validation::column(alias)? {
            Identifier::Plain(name) if !name.contains('.') => Ok(self.dialect().quote_part(&name)),
            other => Err(QueryError::invalid_identifier("alias", other.as_str())),
        }
    }

    /// Name of the FROM table, required by writes.
    pub(crate) fn target_table(&self, operation: &str) -> QueryResult<(String, String)> {
        self.state
            .table
            .as_ref()
            .map(|t| (t.name.clone(), t.rendered.clone()))
            .ok_or_else(|| {
                QueryError::invalid_argument("table", format!("{} requires a table; call from() first", operation))
                    .with_context(operation)
            })
    }
}

/// Result column name for a selected column: the alias if present, else the
/// last dotted segment.
pub(crate) fn result_key(column: &str) -> String {
    let trimmed = column.trim();
    let lower = trimmed.to_ascii_lowercase();
    if let Some(pos) = lower.rfind(" as ") {
        return unquote(trimmed[pos + 4..].trim());
    }
    unquote(trimmed.rsplit('.').next().unwrap_or(trimmed))
}

fn unquote(s: &str) -> String {
    s.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']')).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_key() {
        assert_eq!(result_key("id"), "id");
        assert_eq!(result_key("users.email"), "email");
        assert_eq!(result_key("u.id AS uid"), "uid");
        assert_eq!(result_key("COUNT(*) as \"total\""), "total");
    }
}
