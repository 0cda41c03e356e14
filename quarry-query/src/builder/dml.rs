//! INSERT, UPDATE, DELETE and raw statements.
//!
//! Writes target the table set with `from()`. Setting a write does not clear
//! SELECT clauses; the compiler picks one statement by precedence.

use super::QueryBuilder;
use super::state::{DeletePayload, InsertPayload, RawStatement, UpdatePayload};
use crate::error::{QueryError, QueryResult};
use crate::value::{Record, SqlValue};

impl QueryBuilder {
    /// Insert one row.
    pub fn insert(self, record: Record) -> QueryResult<Self> {
        self.insert_many(vec![record])
    }

    /// Insert several rows in one statement. Every row must have the same
    /// set of columns; values are reordered to the first row's column order.
    pub fn insert_many(mut self, records: Vec<Record>) -> QueryResult<Self> {
        let (_, table) = self.target_table("insert")?;
        let Some(first) = records.first() else {
            return Err(QueryError::invalid_argument("insert", "at least one row is required"));
        };
        if first.is_empty() {
            return Err(QueryError::invalid_argument("insert", "rows must have at least one column"));
        }
        let names: Vec<String> = first.keys().cloned().collect();
        let columns = names
            .iter()
            .map(|c| self.column_sql(c))
            .collect::<QueryResult<Vec<_>>>()?;

        let mut values: Vec<SqlValue> = Vec::with_capacity(names.len() * records.len());
        for (i, record) in records.iter().enumerate() {
            if record.len() != names.len() {
                return Err(uneven_row(i));
            }
            for name in &names {
                match record.get(name) {
                    Some(value) => values.push(value.clone()),
                    None => return Err(uneven_row(i)),
                }
            }
        }

        let row_count = records.len();
        let span = self.state.bindings.append(values);
        self.state.insert = Some(InsertPayload {
            table,
            columns,
            row_count,
            span,
        });
        Ok(self)
    }

    /// Update the rows matched by the WHERE clauses.
    pub fn update(mut self, patch: Record) -> QueryResult<Self> {
        let (_, table) = self.target_table("update")?;
        if patch.is_empty() {
            return Err(QueryError::invalid_argument("update", "no columns to update"));
        }
        let columns = patch
            .keys()
            .map(|c| self.column_sql(c))
            .collect::<QueryResult<Vec<_>>>()?;
        let span = self.state.bindings.append(patch.into_values());
        self.state.update = Some(UpdatePayload { table, columns, span });
        Ok(self)
    }

    /// Delete the rows matched by the WHERE clauses.
    pub fn delete(mut self) -> QueryResult<Self> {
        let (_, table) = self.target_table("delete")?;
        self.state.delete = Some(DeletePayload { table });
        Ok(self)
    }

    /// Replace the whole statement with caller SQL. The text is sent
    /// verbatim, so placeholders must already use the dialect's syntax.
    pub fn raw(mut self, sql: impl Into<String>, bindings: Vec<SqlValue>) -> Self {
        let span = self.state.bindings.append(bindings);
        self.state.raw = Some(RawStatement { sql: sql.into(), span });
        self
    }
}

fn uneven_row(index: usize) -> QueryError {
    QueryError::invalid_argument(
        "insert",
        format!("row {} has a different column set than row 0", index),
    )
}
