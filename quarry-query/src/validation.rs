//! Identifier guards applied before anything enters clause state.
//!
//! Plain identifiers must match `[A-Za-z_][A-Za-z0-9_]*`, optionally
//! qualified up to `schema.table.column`. Anything that looks like a SQL
//! expression (it contains `.`, `(`, `*`, `,` or an `AS` alias) is accepted
//! verbatim as caller-trusted SQL, the same as `raw()` and `where_raw()`.
//! Statement separators and comments are rejected in every form.

use crate::dialect::DialectProfile;
use crate::error::{QueryError, QueryResult};

const FORBIDDEN_SEQUENCES: &[&str] = &[";", "--", "/*", "*/", "\0"];

const OPERATORS: &[&str] = &["=", "!=", "<>", "<", "<=", ">", ">=", "LIKE", "NOT LIKE", "ILIKE"];

/// A validated column or table reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Identifier {
    /// Plain (possibly qualified) name, quoted at compile time.
    Plain(String),
    /// Caller-trusted expression, rendered verbatim.
    Expression(String),
}

impl Identifier {
    pub(crate) fn render(&self, dialect: &dyn DialectProfile) -> String {
        match self {
            Self::Plain(name) => dialect.escape_identifier(name),
            Self::Expression(expr) => expr.clone(),
        }
    }

    /// The name as the caller wrote it.
    pub(crate) fn as_str(&self) -> &str {
        match self {
            Self::Plain(name) | Self::Expression(name) => name,
        }
    }
}

/// Validate a table name.
pub fn validate_table_name(name: &str) -> QueryResult<()> {
    classify("table", name).map(|_| ())
}

/// Validate a column name or column expression.
pub fn validate_column_name(name: &str) -> QueryResult<()> {
    classify("column", name).map(|_| ())
}

/// Validate a comparison operator and return its canonical spelling.
pub fn validate_operator(op: &str) -> QueryResult<&'static str> {
    let normalized = op.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    OPERATORS
        .iter()
        .find(|candidate| **candidate == normalized)
        .copied()
        .ok_or_else(|| QueryError::invalid_operator(op))
}

/// Whether `expr` is treated as caller-trusted complex SQL.
pub fn is_complex_expression(expr: &str) -> bool {
    expr.contains('.')
        || expr.contains('(')
        || expr.contains('*')
        || expr.contains(',')
        || expr
            .split_whitespace()
            .any(|token| token.eq_ignore_ascii_case("as"))
}

pub(crate) fn table(name: &str) -> QueryResult<Identifier> {
    classify("table", name)
}

pub(crate) fn column(name: &str) -> QueryResult<Identifier> {
    classify("column", name)
}

/// Reject statement separators and comments inside raw SQL fragments.
pub(crate) fn raw_fragment(kind: &str, sql: &str) -> QueryResult<()> {
    if has_forbidden_sequence(sql) {
        return Err(QueryError::invalid_identifier(kind, sql)
            .with_help("Raw fragments may not contain ';', comments or NUL bytes"));
    }
    Ok(())
}

fn classify(kind: &str, name: &str) -> QueryResult<Identifier> {
    let trimmed = name.trim();
    if trimmed.is_empty() || has_forbidden_sequence(trimmed) {
        return Err(QueryError::invalid_identifier(kind, name));
    }
    if is_plain_identifier(trimmed) {
        return Ok(Identifier::Plain(trimmed.to_string()));
    }
    if is_complex_expression(trimmed) {
        return Ok(Identifier::Expression(trimmed.to_string()));
    }
    Err(QueryError::invalid_identifier(kind, name))
}

fn has_forbidden_sequence(s: &str) -> bool {
    FORBIDDEN_SEQUENCES.iter().any(|seq| s.contains(seq))
}

fn is_plain_identifier(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    parts.len() <= 3 && parts.iter().all(|part| is_identifier_part(part))
}

fn is_identifier_part(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
