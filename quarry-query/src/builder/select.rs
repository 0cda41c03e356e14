//! Projection, source, joins, grouping, ordering and paging.

use super::QueryBuilder;
use super::state::{Combinator, Fragment, JoinSpec, JoinType, OrderBySpec, SortOrder, TableRef};
use crate::error::{QueryError, QueryResult};
use crate::validation::{self, validate_operator};
use crate::value::SqlValue;

impl QueryBuilder {
    /// Replace the selected columns. An empty list resets to `*`.
    ///
    /// Accepts arrays, vectors and other iterators of strings.
    pub fn select<I, S>(mut self, columns: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rendered = columns
            .into_iter()
            .map(|c| self.column_sql(c.as_ref()))
            .collect::<QueryResult<Vec<_>>>()?;
        self.state.columns = rendered;
        Ok(self)
    }

    /// Replace the selected columns from a comma-separated list.
    pub fn select_columns(self, columns: &str) -> QueryResult<Self> {
        let parts: Vec<&str> = columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        self.select(parts)
    }

    /// Replace the selected columns with `column AS alias` pairs, given as
    /// `(alias, column)`.
    pub fn select_aliased<I, A, C>(mut self, columns: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = (A, C)>,
        A: AsRef<str>,
        C: AsRef<str>,
    {
        let mut rendered = Vec::new();
        for (alias, column) in columns {
            rendered.push(format!(
                "{} AS {}",
                self.column_sql(column.as_ref())?,
                self.alias_sql(alias.as_ref())?
            ));
        }
        self.state.columns = rendered;
        Ok(self)
    }

    /// Append to the selected columns.
    pub fn add_select<I, S>(mut self, columns: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for column in columns {
            let rendered = self.column_sql(column.as_ref())?;
            self.state.columns.push(rendered);
        }
        Ok(self)
    }

    /// Select distinct rows.
    pub fn distinct(mut self) -> Self {
        self.state.distinct = true;
        self
    }

    /// Set the source table.
    pub fn from(mut self, table: &str) -> QueryResult<Self> {
        let rendered = self.table_sql(table)?;
        self.state.table = Some(TableRef {
            name: table.trim().to_string(),
            rendered,
            alias: None,
        });
        Ok(self)
    }

    /// Set the source table with an alias.
    pub fn from_as(mut self, table: &str, alias: &str) -> QueryResult<Self> {
        let rendered = self.table_sql(table)?;
        let alias = self.alias_sql(alias)?;
        self.state.table = Some(TableRef {
            name: table.trim().to_string(),
            rendered,
            alias: Some(alias),
        });
        Ok(self)
    }

    /// `INNER JOIN table ON first op second`.
    pub fn join(self, table: &str, first: &str, op: &str, second: &str) -> QueryResult<Self> {
        self.join_on(JoinType::Inner, table, first, op, second)
    }

    /// `LEFT JOIN table ON first op second`.
    pub fn left_join(self, table: &str, first: &str, op: &str, second: &str) -> QueryResult<Self> {
        self.join_on(JoinType::Left, table, first, op, second)
    }

    /// `RIGHT JOIN table ON first op second`.
    pub fn right_join(self, table: &str, first: &str, op: &str, second: &str) -> QueryResult<Self> {
        self.join_on(JoinType::Right, table, first, op, second)
    }

    /// `FULL JOIN table ON first op second`.
    pub fn full_join(self, table: &str, first: &str, op: &str, second: &str) -> QueryResult<Self> {
        self.join_on(JoinType::Full, table, first, op, second)
    }

    /// `CROSS JOIN table`.
    pub fn cross_join(mut self, table: &str) -> QueryResult<Self> {
        let table = self.table_sql(table)?;
        self.state.joins.push(JoinSpec {
            table,
            join_type: JoinType::Cross,
            on: None,
        });
        Ok(self)
    }

    /// Join with a caller-written ON condition.
    pub fn join_raw(mut self, join_type: JoinType, table: &str, on: &str) -> QueryResult<Self> {
        let table = self.table_sql(table)?;
        validation::raw_fragment("join condition", on)?;
        let on = (join_type != JoinType::Cross).then(|| on.trim().to_string());
        self.state.joins.push(JoinSpec { table, join_type, on });
        Ok(self)
    }

    fn join_on(mut self, join_type: JoinType, table: &str, first: &str, op: &str, second: &str) -> QueryResult<Self> {
        let table = self.table_sql(table)?;
        let op = validate_operator(op)?;
        let on = format!("{} {} {}", self.column_sql(first)?, op, self.column_sql(second)?);
        self.state.joins.push(JoinSpec {
            table,
            join_type,
            on: Some(on),
        });
        Ok(self)
    }

    /// Add GROUP BY columns.
    pub fn group_by<I, S>(mut self, columns: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for column in columns {
            let rendered = self.column_sql(column.as_ref())?;
            self.state.groups.push(rendered);
        }
        Ok(self)
    }

    /// `HAVING column op value`.
    pub fn having(mut self, column: &str, op: &str, value: impl Into<SqlValue>) -> QueryResult<Self> {
        let op = validate_operator(op)?;
        let mut fragment = Fragment::text(format!("{} {} ", self.column_sql(column)?, op));
        fragment.push_param();
        self.state.push_having(Combinator::And, fragment, vec![value.into()]);
        Ok(self)
    }

    /// HAVING with caller SQL; `?` marks each binding.
    pub fn having_raw(mut self, sql: &str, bindings: Vec<SqlValue>) -> QueryResult<Self> {
        let fragment = raw_predicate("having", sql, &bindings)?;
        self.state.push_having(Combinator::And, fragment, bindings);
        Ok(self)
    }

    /// Order ascending by `column`.
    pub fn order_by(self, column: &str) -> QueryResult<Self> {
        self.order_by_dir(column, SortOrder::Asc)
    }

    /// Order descending by `column`.
    pub fn order_by_desc(self, column: &str) -> QueryResult<Self> {
        self.order_by_dir(column, SortOrder::Desc)
    }

    /// Order by `column` in `direction`.
    pub fn order_by_dir(mut self, column: &str, direction: SortOrder) -> QueryResult<Self> {
        let column = self.column_sql(column)?;
        self.state.orders.push(OrderBySpec {
            column,
            direction,
            raw: false,
        });
        Ok(self)
    }

    /// Order by a caller-written expression, used verbatim.
    pub fn order_by_raw(mut self, expression: &str) -> QueryResult<Self> {
        validation::raw_fragment("order expression", expression)?;
        if expression.trim().is_empty() {
            return Err(QueryError::invalid_identifier("order expression", expression));
        }
        self.state.orders.push(OrderBySpec {
            column: expression.trim().to_string(),
            direction: SortOrder::Asc,
            raw: true,
        });
        Ok(self)
    }

    /// Newest first by `column`.
    pub fn latest(self, column: &str) -> QueryResult<Self> {
        self.order_by_desc(column)
    }

    /// Oldest first by `column`.
    pub fn oldest(self, column: &str) -> QueryResult<Self> {
        self.order_by(column)
    }

    /// Maximum number of rows. Negative values are rejected.
    pub fn limit(mut self, limit: i64) -> QueryResult<Self> {
        self.state.limit = Some(non_negative("limit", limit)?);
        Ok(self)
    }

    /// Rows to skip. Negative values are rejected.
    pub fn offset(mut self, offset: i64) -> QueryResult<Self> {
        self.state.offset = Some(non_negative("offset", offset)?);
        Ok(self)
    }
}

pub(crate) fn non_negative(field: &str, value: i64) -> QueryResult<u64> {
    u64::try_from(value).map_err(|_| {
        QueryError::invalid_argument(field, format!("{} must not be negative, got {}", field, value))
    })
}

/// Parse caller SQL with `?` slots and check the slot count.
pub(crate) fn raw_predicate(kind: &str, sql: &str, bindings: &[SqlValue]) -> QueryResult<Fragment> {
    validation::raw_fragment(kind, sql)?;
    let fragment = Fragment::parse_raw(sql.trim());
    if fragment.param_count() != bindings.len() {
        return Err(QueryError::binding_mismatch(fragment.param_count(), bindings.len())
            .with_sql(sql.to_string()));
    }
    Ok(fragment)
}

#[cfg(test)]
mod tests {
    use crate::builder::JoinType;
    use crate::engine::tests::engine;
    use crate::value::SqlValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_select_shapes() {
        let e = engine();
        let q = e.table("users").unwrap().select(["id", "users.email"]).unwrap();
        assert_eq!(q.to_sql().unwrap().sql, "SELECT \"id\", \"users\".\"email\" FROM \"users\"");

        let q = q.select(Vec::<String>::new()).unwrap();
        assert_eq!(q.to_sql().unwrap().sql, "SELECT * FROM \"users\"");

        let q = e
            .table("users")
            .unwrap()
            .select_aliased([("uid", "id"), ("mail", "email")])
            .unwrap();
        assert_eq!(
            q.to_sql().unwrap().sql,
            "SELECT \"id\" AS \"uid\", \"email\" AS \"mail\" FROM \"users\""
        );

        let q = e.table("users").unwrap().select_columns("id, name").unwrap().distinct();
        assert_eq!(q.to_sql().unwrap().sql, "SELECT DISTINCT \"id\", \"name\" FROM \"users\"");
    }

    #[test]
    fn test_complex_expression_passthrough() {
        let q = engine()
            .table("users")
            .unwrap()
            .select(["COUNT(*) AS total", "u.id AS uid"])
            .unwrap();
        assert_eq!(q.to_sql().unwrap().sql, "SELECT COUNT(*) AS total, u.id AS uid FROM \"users\"");
    }

    #[test]
    fn test_joins_render_in_call_order() {
        let q = engine()
            .table("users")
            .unwrap()
            .left_join("orders", "users.id", "=", "orders.user_id")
            .unwrap()
            .join("teams", "users.team_id", "=", "teams.id")
            .unwrap()
            .cross_join("regions")
            .unwrap()
            .join_raw(JoinType::Right, "audits", "audits.user_id = users.id")
            .unwrap();
        assert_eq!(
            q.to_sql().unwrap().sql,
            "SELECT * FROM \"users\" \
             LEFT JOIN \"orders\" ON \"users\".\"id\" = \"orders\".\"user_id\" \
             INNER JOIN \"teams\" ON \"users\".\"team_id\" = \"teams\".\"id\" \
             CROSS JOIN \"regions\" \
             RIGHT JOIN \"audits\" ON audits.user_id = users.id"
        );
    }

    #[test]
    fn test_group_having_order_paging() {
        let q = engine()
            .table("orders")
            .unwrap()
            .select(["user_id", "SUM(total) AS spent"])
            .unwrap()
            .group_by(["user_id"])
            .unwrap()
            .having("SUM(total)", ">", 100)
            .unwrap()
            .order_by_desc("spent")
            .unwrap()
            .order_by_raw("user_id NULLS LAST")
            .unwrap()
            .limit(5)
            .unwrap()
            .offset(10)
            .unwrap();
        let compiled = q.to_sql().unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT \"user_id\", SUM(total) AS spent FROM \"orders\" GROUP BY \"user_id\" \
             HAVING SUM(total) > $1 ORDER BY \"spent\" DESC, user_id NULLS LAST LIMIT 5 OFFSET 10"
        );
        assert_eq!(compiled.bindings, vec![SqlValue::Int(100)]);
    }

    #[test]
    fn test_rejects_bad_input() {
        let e = engine();
        assert!(e.table("users").unwrap().limit(-1).unwrap_err().is_validation());
        assert!(e.table("users").unwrap().offset(-1).unwrap_err().is_validation());
        assert!(e.table("users").unwrap().select(["id; DROP TABLE x"]).is_err());
        assert!(e.table("users").unwrap().join("t", "a", "=;", "b").is_err());
        assert!(e.table("users").unwrap().from_as("users", "u.x").is_err());
        assert!(e.table("users").unwrap().order_by_raw("id -- x").is_err());
        assert!(e
            .table("users")
            .unwrap()
            .having_raw("COUNT(*) > ?", vec![])
            .unwrap_err()
            .is_validation());
    }
}
