//! WHERE predicates.
//!
//! Each call appends one predicate and its values to the builder's binding
//! list in the same step. Comparing against `NULL` with `=` or `!=` renders
//! `IS NULL` / `IS NOT NULL` instead of a binding.

use super::QueryBuilder;
use super::select::raw_predicate;
use super::state::{Combinator, Fragment};
use crate::error::QueryResult;
use crate::validation::validate_operator;
use crate::value::SqlValue;

impl QueryBuilder {
    /// `column op value`, joined with AND.
    pub fn r#where(self, column: &str, op: &str, value: impl Into<SqlValue>) -> QueryResult<Self> {
        self.compare(Combinator::And, column, op, value.into())
    }

    /// `column = value`, joined with AND.
    pub fn where_eq(self, column: &str, value: impl Into<SqlValue>) -> QueryResult<Self> {
        self.compare(Combinator::And, column, "=", value.into())
    }

    /// `column op value`, joined with OR.
    pub fn or_where(self, column: &str, op: &str, value: impl Into<SqlValue>) -> QueryResult<Self> {
        self.compare(Combinator::Or, column, op, value.into())
    }

    /// `column = value`, joined with OR.
    pub fn or_where_eq(self, column: &str, value: impl Into<SqlValue>) -> QueryResult<Self> {
        self.compare(Combinator::Or, column, "=", value.into())
    }

    /// `column IN (...)`. An empty list matches nothing.
    pub fn where_in<I, V>(self, column: &str, values: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.membership(Combinator::And, column, false, values.into_iter().map(Into::into).collect())
    }

    /// `column NOT IN (...)`. An empty list matches everything.
    pub fn where_not_in<I, V>(self, column: &str, values: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.membership(Combinator::And, column, true, values.into_iter().map(Into::into).collect())
    }

    /// `column IN (...)`, joined with OR.
    pub fn or_where_in<I, V>(self, column: &str, values: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.membership(Combinator::Or, column, false, values.into_iter().map(Into::into).collect())
    }

    /// `column BETWEEN low AND high`.
    pub fn where_between(self, column: &str, low: impl Into<SqlValue>, high: impl Into<SqlValue>) -> QueryResult<Self> {
        self.between(Combinator::And, column, false, low.into(), high.into())
    }

    /// `column NOT BETWEEN low AND high`.
    pub fn where_not_between(
        self,
        column: &str,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> QueryResult<Self> {
        self.between(Combinator::And, column, true, low.into(), high.into())
    }

    /// `column IS NULL`.
    pub fn where_null(self, column: &str) -> QueryResult<Self> {
        self.null_check(Combinator::And, column, false)
    }

    /// `column IS NOT NULL`.
    pub fn where_not_null(self, column: &str) -> QueryResult<Self> {
        self.null_check(Combinator::And, column, true)
    }

    /// `column IS NULL`, joined with OR.
    pub fn or_where_null(self, column: &str) -> QueryResult<Self> {
        self.null_check(Combinator::Or, column, false)
    }

    /// Caller SQL with `?` marking each binding (`??` for a literal `?`).
    /// The number of slots must equal the number of bindings.
    pub fn where_raw(mut self, sql: &str, bindings: Vec<SqlValue>) -> QueryResult<Self> {
        let fragment = raw_predicate("where", sql, &bindings)?;
        self.state.push_where(Combinator::And, wrap(fragment), bindings);
        Ok(self)
    }

    /// [`where_raw`](Self::where_raw) joined with OR.
    pub fn or_where_raw(mut self, sql: &str, bindings: Vec<SqlValue>) -> QueryResult<Self> {
        let fragment = raw_predicate("where", sql, &bindings)?;
        self.state.push_where(Combinator::Or, wrap(fragment), bindings);
        Ok(self)
    }

    /// A parenthesized group of predicates built on a fresh builder.
    ///
    /// ```rust,no_run
    /// # use quarry_query::prelude::*;
    /// # fn demo(engine: Engine) -> QueryResult<()> {
    /// // WHERE "active" = $1 AND ("role" = $2 OR "role" = $3)
    /// let q = engine
    ///     .table("users")?
    ///     .where_eq("active", true)?
    ///     .where_group(|g| g.where_eq("role", "admin")?.or_where_eq("role", "owner"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn where_group<F>(self, build: F) -> QueryResult<Self>
    where
        F: FnOnce(QueryBuilder) -> QueryResult<QueryBuilder>,
    {
        self.group(Combinator::And, build)
    }

    /// [`where_group`](Self::where_group) joined with OR.
    pub fn or_where_group<F>(self, build: F) -> QueryResult<Self>
    where
        F: FnOnce(QueryBuilder) -> QueryResult<QueryBuilder>,
    {
        self.group(Combinator::Or, build)
    }

    fn compare(mut self, combinator: Combinator, column: &str, op: &str, value: SqlValue) -> QueryResult<Self> {
        let op = validate_operator(op)?;
        let column = self.column_sql(column)?;
        if value.is_null() {
            match op {
                "=" => return Ok(self.push_static(combinator, format!("{} IS NULL", column))),
                "!=" | "<>" => return Ok(self.push_static(combinator, format!("{} IS NOT NULL", column))),
                _ => {}
            }
        }
        let mut fragment = Fragment::text(format!("{} {} ", column, op));
        fragment.push_param();
        self.state.push_where(combinator, fragment, vec![value]);
        Ok(self)
    }

    fn membership(mut self, combinator: Combinator, column: &str, negated: bool, values: Vec<SqlValue>) -> QueryResult<Self> {
        let column = self.column_sql(column)?;
        if values.is_empty() {
            let always = if negated { "1 = 1" } else { "1 = 0" };
            return Ok(self.push_static(combinator, always.to_string()));
        }
        let keyword = if negated { "NOT IN" } else { "IN" };
        let mut fragment = Fragment::text(format!("{} {} (", column, keyword));
        for i in 0..values.len() {
            if i > 0 {
                fragment.push_sql(", ");
            }
            fragment.push_param();
        }
        fragment.push_sql(")");
        self.state.push_where(combinator, fragment, values);
        Ok(self)
    }

    fn between(mut self, combinator: Combinator, column: &str, negated: bool, low: SqlValue, high: SqlValue) -> QueryResult<Self> {
        let column = self.column_sql(column)?;
        let keyword = if negated { "NOT BETWEEN" } else { "BETWEEN" };
        let mut fragment = Fragment::text(format!("{} {} ", column, keyword));
        fragment.push_param().push_sql(" AND ").push_param();
        self.state.push_where(combinator, fragment, vec![low, high]);
        Ok(self)
    }

    fn null_check(self, combinator: Combinator, column: &str, negated: bool) -> QueryResult<Self> {
        let column = self.column_sql(column)?;
        let test = if negated { "IS NOT NULL" } else { "IS NULL" };
        Ok(self.push_static(combinator, format!("{} {}", column, test)))
    }

    fn group<F>(mut self, combinator: Combinator, build: F) -> QueryResult<Self>
    where
        F: FnOnce(QueryBuilder) -> QueryResult<QueryBuilder>,
    {
        let inner = build(QueryBuilder::new(self.engine.clone()))?;
        if inner.state.wheres.is_empty() {
            return Ok(self);
        }
        let mut fragment = Fragment::text("(");
        let mut values = Vec::new();
        for (i, predicate) in inner.state.wheres.iter().enumerate() {
            if i > 0 {
                fragment.push_sql(&format!(" {} ", predicate.combinator.as_sql()));
            }
            fragment.append(&predicate.fragment);
            values.extend_from_slice(inner.state.bindings.span(predicate.fragment.span()));
        }
        fragment.push_sql(")");
        self.state.push_where(combinator, fragment, values);
        Ok(self)
    }

    pub(crate) fn push_static(mut self, combinator: Combinator, sql: String) -> Self {
        self.state.push_where(combinator, Fragment::text(sql), Vec::new());
        self
    }
}

/// Parenthesize caller SQL so its own OR cannot leak into the chain.
fn wrap(inner: Fragment) -> Fragment {
    let mut fragment = Fragment::text("(");
    fragment.append(&inner);
    fragment.push_sql(")");
    fragment
}

#[cfg(test)]
mod tests {
    use crate::engine::tests::engine;
    use crate::value::SqlValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_where_chain() {
        let q = engine()
            .table("users")
            .unwrap()
            .where_eq("status", "active")
            .unwrap()
            .r#where("age", ">=", 18)
            .unwrap()
            .or_where("role", "like", "adm%")
            .unwrap();
        let compiled = q.to_sql().unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"users\" WHERE \"status\" = $1 AND \"age\" >= $2 OR \"role\" LIKE $3"
        );
        assert_eq!(
            compiled.bindings,
            vec![SqlValue::from("active"), SqlValue::Int(18), SqlValue::from("adm%")]
        );
    }

    #[test]
    fn test_in_between_null() {
        let q = engine()
            .table("t")
            .unwrap()
            .where_in("id", [1, 2, 3])
            .unwrap()
            .where_not_between("score", 10, 20)
            .unwrap()
            .where_null("deleted_at")
            .unwrap()
            .or_where_null("archived_at")
            .unwrap()
            .where_not_null("email")
            .unwrap();
        let compiled = q.to_sql().unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"t\" WHERE \"id\" IN ($1, $2, $3) AND \"score\" NOT BETWEEN $4 AND $5 \
             AND \"deleted_at\" IS NULL OR \"archived_at\" IS NULL AND \"email\" IS NOT NULL"
        );
        assert_eq!(compiled.bindings.len(), 5);
    }

    #[test]
    fn test_empty_in_lists() {
        let q = engine()
            .table("t")
            .unwrap()
            .where_in("id", Vec::<i64>::new())
            .unwrap()
            .where_not_in("id", Vec::<i64>::new())
            .unwrap();
        let compiled = q.to_sql().unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM \"t\" WHERE 1 = 0 AND 1 = 1");
        assert!(compiled.bindings.is_empty());
    }

    #[test]
    fn test_null_comparison() {
        let q = engine()
            .table("t")
            .unwrap()
            .where_eq("a", SqlValue::Null)
            .unwrap()
            .r#where("b", "<>", None::<i64>)
            .unwrap();
        assert_eq!(
            q.to_sql().unwrap().sql,
            "SELECT * FROM \"t\" WHERE \"a\" IS NULL AND \"b\" IS NOT NULL"
        );
    }

    #[test]
    fn test_raw_and_groups() {
        let q = engine()
            .table("t")
            .unwrap()
            .where_eq("a", 1)
            .unwrap()
            .where_raw("lower(name) = ? OR tags ?? 'x'", vec!["bob".into()])
            .unwrap()
            .or_where_group(|g| g.where_eq("b", 2)?.or_where_in("c", [3, 4]))
            .unwrap();
        let compiled = q.to_sql().unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"t\" WHERE \"a\" = $1 AND (lower(name) = $2 OR tags ? 'x') \
             OR (\"b\" = $3 OR \"c\" IN ($4, $5))"
        );
        assert_eq!(
            compiled.bindings,
            vec![
                SqlValue::Int(1),
                SqlValue::from("bob"),
                SqlValue::Int(2),
                SqlValue::Int(3),
                SqlValue::Int(4)
            ]
        );
    }

    #[test]
    fn test_where_raw_slot_mismatch() {
        let err = engine()
            .table("t")
            .unwrap()
            .where_raw("a = ? AND b = ?", vec![1.into()])
            .unwrap_err();
        assert!(err.is_validation());
        assert!(engine().table("t").unwrap().where_raw("a = 1; DROP TABLE t", vec![]).is_err());
    }

    #[test]
    fn test_invalid_operator() {
        assert!(engine().table("t").unwrap().r#where("a", "IS", 1).is_err());
    }
}
