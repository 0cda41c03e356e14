//! Executing terminals.
//!
//! Every terminal borrows the builder. Forced limits and aggregate
//! projections are applied to a scratch copy of the clause state, so the
//! builder is unchanged afterwards whether the call succeeded or failed.

use std::ops::ControlFlow;

use indexmap::IndexMap;
use tracing::debug;

use super::compile::{CompiledQuery, compile};
use super::state::{CacheDirective, ClauseState};
use super::{QueryBuilder, result_key};
use crate::cache::{Invalidation, referenced_tables};
use crate::crypto::decrypt_rows;
use crate::error::{QueryError, QueryResult};
use crate::executor::{ExecOutput, QueryOutput};
use crate::value::Row;

const AGGREGATE_ALIAS: &str = "aggregate";

impl QueryBuilder {
    /// Run the statement and return every row.
    pub async fn get(&self) -> QueryResult<Vec<Row>> {
        let compiled = self.to_sql()?;
        Ok(self.fetch(&compiled, true).await?.rows)
    }

    /// The first row, or `None`.
    pub async fn first(&self) -> QueryResult<Option<Row>> {
        let mut state = self.state.scratch();
        state.limit = Some(1);
        Ok(self.fetch_state(&state).await?.into_iter().next())
    }

    /// The first row, or a not-found error.
    pub async fn first_or_fail(&self) -> QueryResult<Row> {
        self.first()
            .await?
            .ok_or_else(|| QueryError::not_found(self.table_label()).with_context("first_or_fail"))
    }

    /// The only matching row. Zero rows is a not-found error, more than one
    /// a not-unique error.
    pub async fn sole(&self) -> QueryResult<Row> {
        let mut state = self.state.scratch();
        state.limit = Some(2);
        let mut rows = self.fetch_state(&state).await?;
        match rows.len() {
            0 => Err(QueryError::not_found(self.table_label()).with_context("sole")),
            1 => Ok(rows.remove(0)),
            _ => Err(QueryError::not_unique(self.table_label()).with_context("sole")),
        }
    }

    /// Number of matching rows.
    pub async fn count(&self) -> QueryResult<u64> {
        let value = self.aggregate("COUNT(*)").await?;
        Ok(json_to_u64(&value).unwrap_or(0))
    }

    /// Sum of `column`; `None` when no row matched.
    pub async fn sum(&self, column: &str) -> QueryResult<Option<f64>> {
        let column = self.column_sql(column)?;
        Ok(json_to_f64(&self.aggregate(&format!("SUM({})", column)).await?))
    }

    /// Average of `column`; `None` when no row matched.
    pub async fn avg(&self, column: &str) -> QueryResult<Option<f64>> {
        let column = self.column_sql(column)?;
        Ok(json_to_f64(&self.aggregate(&format!("AVG({})", column)).await?))
    }

    /// Smallest value of `column`.
    pub async fn min(&self, column: &str) -> QueryResult<Option<serde_json::Value>> {
        let column = self.column_sql(column)?;
        Ok(non_null(self.aggregate(&format!("MIN({})", column)).await?))
    }

    /// Largest value of `column`.
    pub async fn max(&self, column: &str) -> QueryResult<Option<serde_json::Value>> {
        let column = self.column_sql(column)?;
        Ok(non_null(self.aggregate(&format!("MAX({})", column)).await?))
    }

    /// Whether any row matches.
    pub async fn exists(&self) -> QueryResult<bool> {
        self.ensure_select("exists")?;
        let mut state = self.state.scratch();
        state.columns = vec!["1 AS present".to_string()];
        state.orders.clear();
        state.limit = Some(1);
        let compiled = compile(&state, self.dialect())?;
        Ok(!self
            .fetch_derived(&compiled, self.aggregates_use_cache())
            .await?
            .rows
            .is_empty())
    }

    /// Values of one column.
    pub async fn pluck(&self, column: &str) -> QueryResult<Vec<serde_json::Value>> {
        self.ensure_select("pluck")?;
        let mut state = self.state.scratch();
        state.columns = vec![self.column_sql(column)?];
        let key = result_key(column);
        let rows = self.fetch_state(&state).await?;
        Ok(rows
            .into_iter()
            .map(|mut row| row.remove(&key).unwrap_or(serde_json::Value::Null))
            .collect())
    }

    /// `key_column → value_column` pairs in row order. Later rows win on
    /// duplicate keys.
    pub async fn pluck_key_value(
        &self,
        value_column: &str,
        key_column: &str,
    ) -> QueryResult<IndexMap<String, serde_json::Value>> {
        self.ensure_select("pluck_key_value")?;
        let mut state = self.state.scratch();
        state.columns = vec![self.column_sql(value_column)?, self.column_sql(key_column)?];
        let value_key = result_key(value_column);
        let key_key = result_key(key_column);
        let rows = self.fetch_state(&state).await?;

        let mut out = IndexMap::with_capacity(rows.len());
        for mut row in rows {
            let key = match row.get(&key_key) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => continue,
                Some(other) => other.to_string(),
            };
            let value = row.remove(&value_key).unwrap_or(serde_json::Value::Null);
            out.insert(key, value);
        }
        Ok(out)
    }

    /// Process matching rows `size` at a time.
    ///
    /// Pages advance by offset until one comes back short or the callback
    /// returns `ControlFlow::Break`. Any limit or offset on the builder is
    /// replaced by the paging.
    pub async fn chunk<F>(&self, size: u64, mut callback: F) -> QueryResult<()>
    where
        F: FnMut(Vec<Row>) -> QueryResult<ControlFlow<()>>,
    {
        if size == 0 {
            return Err(QueryError::invalid_argument("size", "chunk size must be at least 1"));
        }
        let mut offset = 0;
        loop {
            let rows = self.fetch_page(offset, size).await?;
            let fetched = rows.len() as u64;
            if fetched == 0 {
                return Ok(());
            }
            if callback(rows)?.is_break() || fetched < size {
                return Ok(());
            }
            offset += size;
        }
    }

    /// Run a write statement.
    ///
    /// With a cache configured and `invalidate_on_write` enabled, cached
    /// reads of the written tables are invalidated afterwards.
    pub async fn execute(&self) -> QueryResult<ExecOutput> {
        let compiled = self.to_sql()?;
        debug!(sql = %compiled.sql, bindings = compiled.bindings.len(), "executing statement");
        let output = self
            .engine
            .executor
            .execute(&compiled.sql, &compiled.bindings)
            .await
            .map_err(|e| e.attach_statement(&compiled.sql, &compiled.bindings))?;

        if let Some(cache) = &self.engine.cache {
            if cache.config().invalidate_on_write {
                let tables = self.written_tables(&compiled);
                if !tables.is_empty() {
                    cache.invalidate(&Invalidation::tables(tables)).await;
                }
            }
        }
        Ok(output)
    }

    pub(crate) async fn fetch_page(&self, offset: u64, size: u64) -> QueryResult<Vec<Row>> {
        let mut state = self.state.scratch();
        state.limit = Some(size);
        state.offset = Some(offset);
        self.fetch_state(&state).await
    }

    pub(crate) async fn fetch_state(&self, state: &ClauseState) -> QueryResult<Vec<Row>> {
        let compiled = compile(state, self.dialect())?;
        Ok(self.fetch_derived(&compiled, true).await?.rows)
    }

    /// Run the builder's own statement through the cache when allowed, then
    /// decrypt.
    pub(crate) async fn fetch(&self, compiled: &CompiledQuery, use_cache: bool) -> QueryResult<QueryOutput> {
        self.fetch_with(compiled, use_cache, &self.cache).await
    }

    /// Like [`fetch`](Self::fetch), for a statement compiled from a scratch
    /// copy of the state. A caller-supplied cache key is scoped to the
    /// statement so pages and projections never share an entry.
    pub(crate) async fn fetch_derived(&self, compiled: &CompiledQuery, use_cache: bool) -> QueryResult<QueryOutput> {
        match (&self.engine.cache, &self.cache.key) {
            (Some(cache), Some(key)) => {
                let directive = CacheDirective {
                    key: Some(cache.scoped_key(key, compiled)),
                    ..self.cache.clone()
                };
                self.fetch_with(compiled, use_cache, &directive).await
            }
            _ => self.fetch(compiled, use_cache).await,
        }
    }

    async fn fetch_with(
        &self,
        compiled: &CompiledQuery,
        use_cache: bool,
        directive: &CacheDirective,
    ) -> QueryResult<QueryOutput> {
        let mut output = match &self.engine.cache {
            Some(cache) if use_cache && directive.enabled => {
                cache
                    .read_through(compiled, directive, || self.run_query(compiled))
                    .await?
            }
            _ => self.run_query(compiled).await?,
        };
        if let Some(decryptor) = &self.engine.decryptor {
            decrypt_rows(decryptor.as_ref(), &self.decrypt_fields, &mut output.rows);
        }
        Ok(output)
    }

    /// Run a read statement directly against the executor.
    pub(crate) async fn run_query(&self, compiled: &CompiledQuery) -> QueryResult<QueryOutput> {
        debug!(sql = %compiled.sql, bindings = compiled.bindings.len(), "executing query");
        self.engine
            .executor
            .query(&compiled.sql, &compiled.bindings)
            .await
            .map_err(|e| e.attach_statement(&compiled.sql, &compiled.bindings))
    }

    async fn aggregate(&self, expression: &str) -> QueryResult<serde_json::Value> {
        let compiled = self.aggregate_sql(expression)?;
        let mut rows = self
            .fetch_derived(&compiled, self.aggregates_use_cache())
            .await?
            .rows;
        if rows.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        let mut row = rows.swap_remove(0);
        Ok(row
            .remove(AGGREGATE_ALIAS)
            .or_else(|| row.into_iter().next().map(|(_, v)| v))
            .unwrap_or(serde_json::Value::Null))
    }

    /// Aggregate statement. Grouped or distinct queries are wrapped in a
    /// derived table so the aggregate runs over their result rows.
    pub(crate) fn aggregate_sql(&self, expression: &str) -> QueryResult<CompiledQuery> {
        self.ensure_select("aggregate")?;
        let projection = format!("{} AS {}", expression, AGGREGATE_ALIAS);
        if self.state.groups.is_empty() && !self.state.distinct {
            return compile(&self.state.for_aggregate(projection), self.dialect());
        }
        let mut inner = self.state.scratch();
        inner.orders.clear();
        inner.limit = None;
        inner.offset = None;
        let inner = compile(&inner, self.dialect())?;
        Ok(CompiledQuery {
            sql: format!("SELECT {} FROM ({}) AS aggregate_table", projection, inner.sql),
            bindings: inner.bindings,
        })
    }

    /// Projection terminals rewrite the SELECT; a pending write or raw
    /// override would be sent in its place.
    fn ensure_select(&self, terminal: &str) -> QueryResult<()> {
        if self.state.raw.is_some() || self.state.is_write() {
            return Err(QueryError::invalid_argument(
                terminal,
                "not available on a builder with a pending write or raw statement",
            ));
        }
        Ok(())
    }

    fn aggregates_use_cache(&self) -> bool {
        self.engine.config.aggregates_use_cache
    }

    fn table_label(&self) -> String {
        self.state
            .table_name()
            .map(str::to_string)
            .unwrap_or_else(|| "query".to_string())
    }

    fn written_tables(&self, compiled: &CompiledQuery) -> Vec<String> {
        if self.state.raw.is_some() {
            let head = compiled.sql.trim_start().to_ascii_uppercase();
            if head.starts_with("SELECT") || head.starts_with("WITH") {
                return Vec::new();
            }
            return referenced_tables(&compiled.sql);
        }
        if self.state.is_write() {
            return self
                .state
                .table_name()
                .and_then(|name| referenced_tables(&format!("FROM {}", name)).into_iter().next())
                .into_iter()
                .collect();
        }
        Vec::new()
    }
}

fn json_to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn json_to_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse().ok().or_else(|| s.parse::<f64>().ok().map(|f| f as u64))
        }
        other => json_to_f64(other).map(|f| f as u64),
    }
}

fn non_null(value: serde_json::Value) -> Option<serde_json::Value> {
    (!value.is_null()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::engine;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_aggregate_sql_strips_paging() {
        let q = engine()
            .table("users")
            .unwrap()
            .where_eq("active", true)
            .unwrap()
            .order_by("name")
            .unwrap()
            .limit(10)
            .unwrap();
        let compiled = q.aggregate_sql("COUNT(*)").unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT COUNT(*) AS aggregate FROM \"users\" WHERE \"active\" = $1"
        );
        // Builder untouched.
        assert!(q.to_sql().unwrap().sql.ends_with("ORDER BY \"name\" ASC LIMIT 10"));
    }

    #[test]
    fn test_aggregate_sql_wraps_groups() {
        let q = engine()
            .table("orders")
            .unwrap()
            .select(["user_id"])
            .unwrap()
            .group_by(["user_id"])
            .unwrap()
            .having("COUNT(*)", ">", 2)
            .unwrap();
        let compiled = q.aggregate_sql("COUNT(*)").unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT COUNT(*) AS aggregate FROM (SELECT \"user_id\" FROM \"orders\" \
             GROUP BY \"user_id\" HAVING COUNT(*) > $1) AS aggregate_table"
        );
        assert_eq!(compiled.bindings.len(), 1);
    }

    #[test]
    fn test_projection_terminals_reject_writes() {
        let mut row = crate::value::Record::new();
        row.insert("name".into(), crate::value::SqlValue::from("x"));
        let insert = engine().table("users").unwrap().insert(row).unwrap();
        let err = insert.aggregate_sql("COUNT(*)").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidArgument);

        let raw = engine().query().raw("SELECT 1", vec![]);
        assert!(raw.aggregate_sql("COUNT(*)").is_err());
        assert!(raw.ensure_select("pluck").is_err());
        assert!(engine().table("users").unwrap().ensure_select("exists").is_ok());
    }

    #[test]
    fn test_json_to_u64_keeps_precision() {
        let big = (1u64 << 53) + 1;
        assert_eq!(json_to_u64(&serde_json::json!(big)), Some(big));
        assert_eq!(json_to_u64(&serde_json::json!(big.to_string())), Some(big));
        assert_eq!(json_to_u64(&serde_json::json!(4.0)), Some(4));
        assert_eq!(json_to_u64(&serde_json::Value::Null), None);
    }

    #[test]
    fn test_json_to_f64() {
        assert_eq!(json_to_f64(&serde_json::json!(3)), Some(3.0));
        assert_eq!(json_to_f64(&serde_json::json!("12.5")), Some(12.5));
        assert_eq!(json_to_f64(&serde_json::Value::Null), None);
    }
}
