//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use quarry::query::{BoxFuture, ExecOutput, QueryOutput, Row};
use quarry::{Executor, QueryError, QueryResult, SqlValue};
use regex_lite::Regex;
use serde_json::json;

/// One statement seen by [`TableExecutor`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub sql: String,
    pub bindings: Vec<SqlValue>,
}

/// An executor over a fixed, id-ordered row set.
///
/// It understands just enough SQL for the engine's own statements:
/// `COUNT(*) AS aggregate`, a single `"col" > $n` cursor predicate, and
/// trailing `LIMIT n` / `OFFSET m`. Every other predicate is ignored, so the
/// row set stands for "the rows that match".
#[derive(Default)]
pub struct TableExecutor {
    rows: Vec<Row>,
    queries: Mutex<Vec<Call>>,
    writes: Mutex<Vec<Call>>,
    fail_next: Mutex<Option<QueryError>>,
}

impl TableExecutor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Rows `{id: 1..=n, name: "user-i"}`.
    pub fn with_users(n: i64) -> Self {
        Self::new((1..=n).map(|i| row(json!({"id": i, "name": format!("user-{}", i)}))).collect())
    }

    pub fn queries(&self) -> Vec<Call> {
        self.queries.lock().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().len()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.writes.lock().clone()
    }

    /// Make the next read fail with `error`.
    pub fn fail_next(&self, error: QueryError) {
        *self.fail_next.lock() = Some(error);
    }

    fn answer(&self, sql: &str, bindings: &[SqlValue]) -> Vec<Row> {
        let mut rows: Vec<Row> = self.rows.clone();

        if let Some(caps) = cursor_pattern().captures(sql) {
            let column = &caps[1];
            let index: usize = caps[2].parse().unwrap_or(1);
            if let Some(SqlValue::Int(after)) = bindings.get(index - 1) {
                rows.retain(|r| r.get(column).and_then(|v| v.as_i64()).is_some_and(|v| v > *after));
            }
        }

        if sql.contains("COUNT(*) AS aggregate") {
            return vec![row(json!({"aggregate": rows.len()}))];
        }

        let offset = capture_number(offset_pattern(), sql).unwrap_or(0);
        let limit = capture_number(limit_pattern(), sql).unwrap_or(usize::MAX);
        rows.into_iter().skip(offset).take(limit).collect()
    }
}

impl Executor for TableExecutor {
    fn query<'a>(&'a self, sql: &'a str, bindings: &'a [SqlValue]) -> BoxFuture<'a, QueryResult<QueryOutput>> {
        Box::pin(async move {
            self.queries.lock().push(Call {
                sql: sql.to_string(),
                bindings: bindings.to_vec(),
            });
            if let Some(error) = self.fail_next.lock().take() {
                return Err(error);
            }
            Ok(QueryOutput::from_rows(self.answer(sql, bindings)))
        })
    }

    fn execute<'a>(&'a self, sql: &'a str, bindings: &'a [SqlValue]) -> BoxFuture<'a, QueryResult<ExecOutput>> {
        Box::pin(async move {
            self.writes.lock().push(Call {
                sql: sql.to_string(),
                bindings: bindings.to_vec(),
            });
            Ok(ExecOutput {
                affected_rows: 1,
                insert_id: None,
            })
        })
    }
}

/// Build a row from a JSON object literal.
pub fn row(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("row fixture must be an object, got {}", other),
    }
}

/// Shared handle plus a trait-object clone for `Engine::builder`.
pub fn shared(executor: TableExecutor) -> (Arc<TableExecutor>, Arc<dyn Executor>) {
    let executor = Arc::new(executor);
    let dynamic: Arc<dyn Executor> = executor.clone();
    (executor, dynamic)
}

fn capture_number(pattern: &Regex, sql: &str) -> Option<usize> {
    pattern.captures(sql).and_then(|c| c[1].parse().ok())
}

fn cursor_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""(\w+)" > \$(\d+)"#).unwrap())
}

fn limit_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"LIMIT (\d+)").unwrap())
}

fn offset_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"OFFSET (\d+)").unwrap())
}
