//! Clause state: the mutable, not-yet-compiled statement a builder owns.
//!
//! Text in the state is already rendered for the builder's dialect
//! (identifiers quoted, date functions spelled). Literal values never appear
//! in the text: each fragment carries parameter slots and the span of the
//! builder's single [`BindingList`] that fills them.

use std::ops::Range;
use std::time::Duration;

use crate::value::SqlValue;

/// The builder's one ordered, append-only list of bound values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingList {
    values: Vec<SqlValue>,
}

impl BindingList {
    /// Number of values collected so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no value has been collected.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All values in collection order.
    pub fn as_slice(&self) -> &[SqlValue] {
        &self.values
    }

    /// Values owned by one clause.
    pub(crate) fn span(&self, span: &Range<usize>) -> &[SqlValue] {
        &self.values[span.clone()]
    }

    /// Append `values` and return the span they occupy.
    pub(crate) fn append(&mut self, values: impl IntoIterator<Item = SqlValue>) -> Range<usize> {
        let start = self.values.len();
        self.values.extend(values);
        start..self.values.len()
    }
}

/// One piece of a fragment.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlPart {
    Sql(String),
    Param,
}

/// SQL text with parameter slots, bound to a span of the [`BindingList`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    parts: Vec<SqlPart>,
    span: Range<usize>,
}

impl Fragment {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn text(sql: impl Into<String>) -> Self {
        let mut fragment = Self::new();
        fragment.push_sql(&sql.into());
        fragment
    }

    /// Split caller SQL on `?` slots. `??` is a literal question mark.
    pub(crate) fn parse_raw(sql: &str) -> Self {
        let mut fragment = Self::new();
        let mut chunk = String::new();
        let mut chars = sql.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '?' {
                if chars.peek() == Some(&'?') {
                    chars.next();
                    chunk.push('?');
                } else {
                    fragment.push_sql(&chunk);
                    chunk.clear();
                    fragment.push_param();
                }
            } else {
                chunk.push(c);
            }
        }
        fragment.push_sql(&chunk);
        fragment
    }

    pub(crate) fn push_sql(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }
        match self.parts.last_mut() {
            Some(SqlPart::Sql(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Sql(sql.to_string())),
        }
        self
    }

    pub(crate) fn push_param(&mut self) -> &mut Self {
        self.parts.push(SqlPart::Param);
        self
    }

    /// Append another fragment's parts. Its bindings are the caller's to
    /// carry over.
    pub(crate) fn append(&mut self, other: &Fragment) -> &mut Self {
        for part in &other.parts {
            match part {
                SqlPart::Sql(sql) => {
                    self.push_sql(sql);
                }
                SqlPart::Param => {
                    self.push_param();
                }
            }
        }
        self
    }

    pub(crate) fn param_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|part| matches!(part, SqlPart::Param))
            .count()
    }

    pub(crate) fn parts(&self) -> &[SqlPart] {
        &self.parts
    }

    pub(crate) fn span(&self) -> &Range<usize> {
        &self.span
    }

    /// Append `values` to `bindings` in the same step that fixes this
    /// fragment's span.
    pub(crate) fn bind(mut self, bindings: &mut BindingList, values: Vec<SqlValue>) -> Self {
        debug_assert_eq!(self.param_count(), values.len());
        self.span = bindings.append(values);
        self
    }
}

/// How a predicate joins the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// `AND`.
    And,
    /// `OR`.
    Or,
}

impl Combinator {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// A WHERE or HAVING condition. The first predicate's combinator is ignored
/// when rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct WherePredicate {
    /// Link to the previous predicate.
    pub combinator: Combinator,
    pub(crate) fragment: Fragment,
}

/// Join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// `INNER JOIN`.
    Inner,
    /// `LEFT JOIN`.
    Left,
    /// `RIGHT JOIN`.
    Right,
    /// `FULL JOIN`.
    Full,
    /// `CROSS JOIN`.
    Cross,
}

impl JoinType {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Full => "FULL JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

/// A join, rendered in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    /// Rendered table reference.
    pub table: String,
    /// Join kind.
    pub join_type: JoinType,
    /// Rendered ON condition; `None` for CROSS joins.
    pub on: Option<String>,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBySpec {
    /// Rendered column, or the raw expression when `raw` is set.
    pub column: String,
    /// Direction (ignored for raw entries).
    pub direction: SortOrder,
    /// Whether `column` is a caller-supplied expression.
    pub raw: bool,
}

/// The FROM target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// Name as given, used for error messages and DML.
    pub name: String,
    /// Rendered table reference.
    pub rendered: String,
    /// Rendered alias, if any.
    pub alias: Option<String>,
}

/// Pending INSERT.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertPayload {
    pub(crate) table: String,
    pub(crate) columns: Vec<String>,
    pub(crate) row_count: usize,
    pub(crate) span: Range<usize>,
}

/// Pending UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePayload {
    pub(crate) table: String,
    pub(crate) columns: Vec<String>,
    pub(crate) span: Range<usize>,
}

/// Pending DELETE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePayload {
    pub(crate) table: String,
}

/// Raw statement override, returned verbatim by the compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatement {
    pub(crate) sql: String,
    pub(crate) span: Range<usize>,
}

/// Everything a builder has accumulated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClauseState {
    pub(crate) columns: Vec<String>,
    pub(crate) distinct: bool,
    pub(crate) table: Option<TableRef>,
    pub(crate) joins: Vec<JoinSpec>,
    pub(crate) wheres: Vec<WherePredicate>,
    pub(crate) groups: Vec<String>,
    pub(crate) havings: Vec<WherePredicate>,
    pub(crate) orders: Vec<OrderBySpec>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) insert: Option<InsertPayload>,
    pub(crate) update: Option<UpdatePayload>,
    pub(crate) delete: Option<DeletePayload>,
    pub(crate) raw: Option<RawStatement>,
    pub(crate) bindings: BindingList,
}

impl ClauseState {
    /// The shared binding list.
    pub fn bindings(&self) -> &BindingList {
        &self.bindings
    }

    /// Selected column expressions; empty means `*`.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Accumulated WHERE predicates.
    pub fn wheres(&self) -> &[WherePredicate] {
        &self.wheres
    }

    /// Accumulated joins.
    pub fn joins(&self) -> &[JoinSpec] {
        &self.joins
    }

    /// Accumulated ORDER BY entries.
    pub fn orders(&self) -> &[OrderBySpec] {
        &self.orders
    }

    /// Current LIMIT.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Current OFFSET.
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// FROM target name, if set.
    pub fn table_name(&self) -> Option<&str> {
        self.table.as_ref().map(|t| t.name.as_str())
    }

    /// Whether a DML payload or raw override is pending.
    pub fn is_write(&self) -> bool {
        self.insert.is_some() || self.update.is_some() || self.delete.is_some()
    }

    pub(crate) fn push_where(&mut self, combinator: Combinator, fragment: Fragment, values: Vec<SqlValue>) {
        let fragment = fragment.bind(&mut self.bindings, values);
        self.wheres.push(WherePredicate { combinator, fragment });
    }

    pub(crate) fn push_having(&mut self, combinator: Combinator, fragment: Fragment, values: Vec<SqlValue>) {
        let fragment = fragment.bind(&mut self.bindings, values);
        self.havings.push(WherePredicate { combinator, fragment });
    }

    /// Fold every WHERE predicate into one parenthesized predicate, so a
    /// condition appended afterwards applies to all of them.
    pub(crate) fn group_wheres(&mut self) {
        if !self.wheres.iter().skip(1).any(|p| p.combinator == Combinator::Or) {
            return;
        }
        let mut fragment = Fragment::text("(");
        let mut values = Vec::new();
        for (i, predicate) in std::mem::take(&mut self.wheres).into_iter().enumerate() {
            if i > 0 {
                fragment.push_sql(&format!(" {} ", predicate.combinator.as_sql()));
            }
            fragment.append(&predicate.fragment);
            values.extend_from_slice(self.bindings.span(predicate.fragment.span()));
        }
        fragment.push_sql(")");
        self.push_where(Combinator::And, fragment, values);
    }

    /// Copy used by terminals that need a modified statement: aggregates,
    /// forced limits and paging. The builder's own state is never touched.
    pub(crate) fn scratch(&self) -> Self {
        self.clone()
    }

    /// Strip clauses that are meaningless under an aggregate projection.
    pub(crate) fn for_aggregate(&self, expression: String) -> Self {
        let mut state = self.scratch();
        state.columns = vec![expression];
        state.distinct = false;
        state.orders.clear();
        state.limit = None;
        state.offset = None;
        state
    }
}

/// Per-builder caching request, set by `cache()` and cleared by `no_cache()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheDirective {
    /// Whether the cache layer is consulted.
    pub enabled: bool,
    /// Entry lifetime; the cache default applies when `None`.
    pub ttl: Option<Duration>,
    /// Caller-supplied key overriding the derived one.
    pub key: Option<String>,
    /// Tags indexed alongside the referenced tables.
    pub tags: Vec<String>,
}
