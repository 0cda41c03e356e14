//! Clause state → SQL text plus ordered bindings.
//!
//! Compilation is a pure function of the state and the dialect. Placeholders
//! are numbered while writing, from the number of bindings already emitted,
//! so the emitted binding list always lines up with the placeholders in the
//! text regardless of the order in which clauses were added.

use serde::{Deserialize, Serialize};

use super::state::{BindingList, ClauseState, Fragment, SqlPart, WherePredicate};
use crate::dialect::DialectProfile;
use crate::error::{QueryError, QueryResult};
use crate::value::SqlValue;

/// A compiled statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    /// SQL text with dialect placeholders.
    pub sql: String,
    /// Values for the placeholders, in order.
    pub bindings: Vec<SqlValue>,
}

impl CompiledQuery {
    /// Split into text and bindings.
    pub fn into_parts(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.bindings)
    }
}

/// Writes SQL text and collects bindings in emission order.
struct SqlWriter<'a> {
    dialect: &'a dyn DialectProfile,
    sql: String,
    bindings: Vec<SqlValue>,
}

impl<'a> SqlWriter<'a> {
    fn new(dialect: &'a dyn DialectProfile) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(128),
            bindings: Vec::new(),
        }
    }

    fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    fn push_param(&mut self, value: SqlValue) -> &mut Self {
        let index = self.bindings.len() + 1;
        self.sql.push_str(&self.dialect.placeholder(index));
        self.bindings.push(value);
        self
    }

    fn push_fragment(&mut self, fragment: &Fragment, all: &BindingList) -> QueryResult<()> {
        let values = all.span(fragment.span());
        if values.len() != fragment.param_count() {
            return Err(QueryError::binding_mismatch(fragment.param_count(), values.len()));
        }
        let mut values = values.iter();
        for part in fragment.parts() {
            match part {
                SqlPart::Sql(sql) => {
                    self.push(sql);
                }
                SqlPart::Param => {
                    if let Some(value) = values.next() {
                        self.push_param(value.clone());
                    }
                }
            }
        }
        Ok(())
    }

    fn push_predicates(&mut self, keyword: &str, predicates: &[WherePredicate], all: &BindingList) -> QueryResult<()> {
        if predicates.is_empty() {
            return Ok(());
        }
        self.push(" ").push(keyword).push(" ");
        for (i, predicate) in predicates.iter().enumerate() {
            if i > 0 {
                self.push(" ").push(predicate.combinator.as_sql()).push(" ");
            }
            self.push_fragment(&predicate.fragment, all)?;
        }
        Ok(())
    }

    fn finish(self) -> CompiledQuery {
        CompiledQuery {
            sql: self.sql,
            bindings: self.bindings,
        }
    }
}

/// Compile `state` for `dialect`.
///
/// Precedence: a raw override wins, then INSERT, UPDATE and DELETE in that
/// order, then SELECT.
pub fn compile(state: &ClauseState, dialect: &dyn DialectProfile) -> QueryResult<CompiledQuery> {
    if let Some(raw) = &state.raw {
        return Ok(CompiledQuery {
            sql: raw.sql.clone(),
            bindings: state.bindings.span(&raw.span).to_vec(),
        });
    }

    let mut w = SqlWriter::new(dialect);
    if let Some(insert) = &state.insert {
        w.push("INSERT INTO ")
            .push(&insert.table)
            .push(" (")
            .push(&insert.columns.join(", "))
            .push(") VALUES ");
        let values = state.bindings.span(&insert.span);
        let width = insert.columns.len();
        if width == 0 || values.len() != width * insert.row_count {
            return Err(QueryError::binding_mismatch(width * insert.row_count, values.len()));
        }
        for (i, row) in values.chunks(width).enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.push("(");
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    w.push(", ");
                }
                w.push_param(value.clone());
            }
            w.push(")");
        }
    } else if let Some(update) = &state.update {
        w.push("UPDATE ").push(&update.table).push(" SET ");
        let values = state.bindings.span(&update.span);
        if values.len() != update.columns.len() {
            return Err(QueryError::binding_mismatch(update.columns.len(), values.len()));
        }
        for (i, (column, value)) in update.columns.iter().zip(values).enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.push(column).push(" = ").push_param(value.clone());
        }
        w.push_predicates("WHERE", &state.wheres, &state.bindings)?;
    } else if let Some(delete) = &state.delete {
        w.push("DELETE FROM ").push(&delete.table);
        w.push_predicates("WHERE", &state.wheres, &state.bindings)?;
    } else {
        write_select(&mut w, state)?;
    }
    Ok(w.finish())
}

fn write_select(w: &mut SqlWriter<'_>, state: &ClauseState) -> QueryResult<()> {
    w.push("SELECT ");
    if state.distinct {
        w.push("DISTINCT ");
    }
    if state.columns.is_empty() {
        w.push("*");
    } else {
        w.push(&state.columns.join(", "));
    }

    if let Some(table) = &state.table {
        w.push(" FROM ").push(&table.rendered);
        if let Some(alias) = &table.alias {
            w.push(" AS ").push(alias);
        }
    }

    for join in &state.joins {
        w.push(" ").push(join.join_type.as_sql()).push(" ").push(&join.table);
        if let Some(on) = &join.on {
            w.push(" ON ").push(on);
        }
    }

    w.push_predicates("WHERE", &state.wheres, &state.bindings)?;

    if !state.groups.is_empty() {
        w.push(" GROUP BY ").push(&state.groups.join(", "));
    }

    w.push_predicates("HAVING", &state.havings, &state.bindings)?;

    if !state.orders.is_empty() {
        let orders: Vec<String> = state
            .orders
            .iter()
            .map(|o| {
                if o.raw {
                    o.column.clone()
                } else {
                    format!("{} {}", o.column, o.direction.as_sql())
                }
            })
            .collect();
        w.push(" ORDER BY ").push(&orders.join(", "));
    }

    let paging = w
        .dialect
        .limit_offset(state.limit, state.offset, !state.orders.is_empty());
    if !paging.is_empty() {
        w.push(" ").push(&paging);
    }
    Ok(())
}

/// Count placeholders in compiled text for `dialect`.
///
/// Positional `?` dialects count question marks outside string literals;
/// numbered dialects count distinct indices.
pub fn count_placeholders(sql: &str, dialect: &dyn DialectProfile) -> usize {
    let probe = dialect.placeholder(1);
    if probe == "?" {
        let mut count = 0;
        let mut in_string = false;
        for c in sql.chars() {
            match c {
                '\'' => in_string = !in_string,
                '?' if !in_string => count += 1,
                _ => {}
            }
        }
        count
    } else {
        let prefix = probe.trim_end_matches('1');
        let mut max = 0;
        let mut rest = sql;
        while let Some(pos) = rest.find(prefix) {
            rest = &rest[pos + prefix.len()..];
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            if let Ok(n) = digits.parse::<usize>() {
                max = max.max(n);
            }
        }
        max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::state::{Combinator, InsertPayload, RawStatement, TableRef, UpdatePayload, DeletePayload};
    use crate::dialect::Dialect;
    use pretty_assertions::assert_eq;

    fn users() -> ClauseState {
        ClauseState {
            table: Some(TableRef {
                name: "users".into(),
                rendered: "\"users\"".into(),
                alias: None,
            }),
            ..Default::default()
        }
    }

    fn eq(column: &str) -> Fragment {
        let mut f = Fragment::text(format!("{} = ", column));
        f.push_param();
        f
    }

    #[test]
    fn test_select_star() {
        let q = compile(&users(), &Dialect::PostgreSQL).unwrap();
        assert_eq!(q.sql, "SELECT * FROM \"users\"");
        assert!(q.bindings.is_empty());
    }

    #[test]
    fn test_update_numbers_set_before_where() {
        let mut state = users();
        // WHERE added first, SET second: render order still numbers SET first.
        state.push_where(Combinator::And, eq("\"id\""), vec![SqlValue::Int(7)]);
        let span = state.bindings.append(vec![SqlValue::from("Ann")]);
        state.update = Some(UpdatePayload {
            table: "\"users\"".into(),
            columns: vec!["\"name\"".into()],
            span,
        });

        let q = compile(&state, &Dialect::PostgreSQL).unwrap();
        assert_eq!(q.sql, "UPDATE \"users\" SET \"name\" = $1 WHERE \"id\" = $2");
        assert_eq!(q.bindings, vec![SqlValue::from("Ann"), SqlValue::Int(7)]);
    }

    #[test]
    fn test_precedence() {
        let mut state = users();
        let span = state.bindings.append(vec![SqlValue::Int(1)]);
        state.insert = Some(InsertPayload {
            table: "\"users\"".into(),
            columns: vec!["\"id\"".into()],
            row_count: 1,
            span,
        });
        state.delete = Some(DeletePayload { table: "\"users\"".into() });
        let q = compile(&state, &Dialect::MySQL).unwrap();
        assert_eq!(q.sql, "INSERT INTO \"users\" (\"id\") VALUES (?)");

        let span = state.bindings.append(vec![SqlValue::Int(9)]);
        state.raw = Some(RawStatement {
            sql: "SELECT ?".into(),
            span,
        });
        let q = compile(&state, &Dialect::MySQL).unwrap();
        assert_eq!(q.sql, "SELECT ?");
        assert_eq!(q.bindings, vec![SqlValue::Int(9)]);
    }

    #[test]
    fn test_count_placeholders() {
        assert_eq!(count_placeholders("a = $1 AND b = $2 OR c = $10", &Dialect::PostgreSQL), 10);
        assert_eq!(count_placeholders("a = ? AND b = '?'", &Dialect::SQLite), 1);
        assert_eq!(count_placeholders("a = @P1 AND b = @P2", &Dialect::MSSQL), 2);
    }
}
