//! The executor seam.
//!
//! The engine never talks to a database itself. It hands compiled SQL and
//! its bindings to an [`Executor`] injected at construction time; drivers,
//! pools and resilience middleware live behind that trait.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::QueryResult;
use crate::value::{Row, SqlValue};

/// A boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Rows returned by a read statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOutput {
    /// Result rows.
    pub rows: Vec<Row>,
    /// Row count as reported by the driver.
    pub row_count: u64,
    /// Column names, when the driver reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl QueryOutput {
    /// Build an output whose row count matches `rows`.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let row_count = rows.len() as u64;
        Self {
            rows,
            row_count,
            fields: None,
        }
    }

    /// Whether no row came back.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecOutput {
    /// Rows touched by the statement.
    pub affected_rows: u64,
    /// Generated key of the last inserted row, if the driver reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_id: Option<SqlValue>,
}

/// Runs compiled statements against a database.
///
/// Implementations must reject rather than hang on bad SQL or lost
/// connectivity. Retries and timeouts belong in the implementation.
pub trait Executor: Send + Sync {
    /// Run a statement that returns rows.
    fn query<'a>(
        &'a self,
        sql: &'a str,
        bindings: &'a [SqlValue],
    ) -> BoxFuture<'a, QueryResult<QueryOutput>>;

    /// Run a statement that modifies data.
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        bindings: &'a [SqlValue],
    ) -> BoxFuture<'a, QueryResult<ExecOutput>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;

    struct Failing;

    impl Executor for Failing {
        fn query<'a>(
            &'a self,
            sql: &'a str,
            _bindings: &'a [SqlValue],
        ) -> BoxFuture<'a, QueryResult<QueryOutput>> {
            Box::pin(async move { Err(QueryError::sql_syntax("near FROM", sql)) })
        }

        fn execute<'a>(
            &'a self,
            _sql: &'a str,
            _bindings: &'a [SqlValue],
        ) -> BoxFuture<'a, QueryResult<ExecOutput>> {
            Box::pin(async { Ok(ExecOutput::default()) })
        }
    }

    #[tokio::test]
    async fn test_dyn_executor() {
        let executor: Box<dyn Executor> = Box::new(Failing);
        let err = executor.query("SELECT", &[]).await.unwrap_err();
        assert!(err.to_string().contains("near FROM"));
        assert_eq!(executor.execute("DELETE", &[]).await.unwrap().affected_rows, 0);
    }

    #[test]
    fn test_output_serde() {
        let mut row = Row::new();
        row.insert("id".into(), serde_json::json!(1));
        let output = QueryOutput::from_rows(vec![row]);
        assert_eq!(output.row_count, 1);

        let json = serde_json::to_string(&output).unwrap();
        let back: QueryOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, output);
    }
}
