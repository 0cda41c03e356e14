//! Error types for query construction and execution.
//!
//! Every error carries an [`ErrorCode`] for programmatic handling plus an
//! [`ErrorContext`] describing what was being done when it happened.
//!
//! # Error Codes
//!
//! Error codes follow a pattern: Q{category}{number}
//! - 1xxx: Query errors (not found, invalid identifier, bad argument)
//! - 3xxx: Connection errors reported by the executor
//! - 5xxx: Execution errors (timeout, syntax, database)
//! - 6xxx: Data errors (serialization)
//! - 7xxx: Configuration errors
//! - 9xxx: Internal errors
//!
//! ```rust
//! use quarry_query::{QueryError, ErrorCode};
//!
//! let err = QueryError::not_found("users");
//! assert_eq!(err.code, ErrorCode::RecordNotFound);
//! assert!(err.to_string().contains("users"));
//!
//! let err = QueryError::invalid_identifier("column", "name; DROP TABLE users");
//! assert!(err.is_validation());
//! ```
//!
//! Cache failures have their own type, [`crate::cache::CacheError`]; the
//! cache layer logs and swallows them so they never surface as a
//! `QueryError` from a query that would otherwise succeed.

use std::fmt;
use thiserror::Error;

use crate::value::SqlValue;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Query errors (1xxx)
    /// No row matched where one was required (Q1001).
    RecordNotFound = 1001,
    /// More than one row matched where exactly one was required (Q1002).
    NotUnique = 1002,
    /// Table or column identifier failed validation (Q1003).
    InvalidIdentifier = 1003,
    /// Argument out of range, e.g. a negative limit (Q1004).
    InvalidArgument = 1004,
    /// Comparison operator not in the allowed set (Q1005).
    InvalidOperator = 1005,
    /// Raw SQL placeholders do not match the supplied bindings (Q1006).
    BindingMismatch = 1006,

    // Connection errors (3xxx)
    /// Database connection failed (Q3001).
    ConnectionFailed = 3001,
    /// Connection timeout (Q3003).
    ConnectionTimeout = 3003,

    // Query execution errors (5xxx)
    /// Query timeout (Q5001).
    QueryTimeout = 5001,
    /// SQL syntax error (Q5002).
    SqlSyntax = 5002,
    /// General database error (Q5005).
    DatabaseError = 5005,

    // Data errors (6xxx)
    /// Serialization error (Q6002).
    SerializationError = 6002,
    /// Deserialization error (Q6003).
    DeserializationError = 6003,

    // Configuration errors (7xxx)
    /// Invalid configuration (Q7001).
    InvalidConfiguration = 7001,
    /// Malformed cache options (Q7004).
    InvalidCacheOptions = 7004,

    // Internal errors (9xxx)
    /// Internal error (Q9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "Q1001").
    pub fn code(&self) -> String {
        format!("Q{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::RecordNotFound => "Record not found",
            Self::NotUnique => "Multiple records found",
            Self::InvalidIdentifier => "Invalid identifier",
            Self::InvalidArgument => "Invalid argument",
            Self::InvalidOperator => "Invalid operator",
            Self::BindingMismatch => "Placeholder and binding count mismatch",
            Self::ConnectionFailed => "Database connection failed",
            Self::ConnectionTimeout => "Connection timeout",
            Self::QueryTimeout => "Query timeout",
            Self::SqlSyntax => "SQL syntax error",
            Self::DatabaseError => "Database error",
            Self::SerializationError => "Serialization error",
            Self::DeserializationError => "Deserialization error",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::InvalidCacheOptions => "Invalid cache options",
            Self::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The table involved.
    pub table: Option<String>,
    /// The field involved.
    pub field: Option<String>,
    /// The compiled SQL (if available).
    pub sql: Option<String>,
    /// The bindings sent with the SQL (if available).
    pub bindings: Option<Vec<SqlValue>>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur during query construction or execution.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(suggestion.into());
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.context.table = Some(table.into());
        self
    }

    /// Set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the SQL query.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Set the bindings that accompanied the SQL.
    pub fn with_bindings(mut self, bindings: Vec<SqlValue>) -> Self {
        self.context.bindings = Some(bindings);
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Attach the statement that failed, keeping any statement the executor
    /// already recorded.
    pub(crate) fn attach_statement(mut self, sql: &str, bindings: &[SqlValue]) -> Self {
        if self.context.sql.is_none() {
            self.context.sql = Some(sql.to_string());
        }
        if self.context.bindings.is_none() {
            self.context.bindings = Some(bindings.to_vec());
        }
        self
    }

    // ============== Constructor Functions ==============

    /// Create a not found error.
    pub fn not_found(table: impl Into<String>) -> Self {
        let table = table.into();
        Self::new(
            ErrorCode::RecordNotFound,
            format!("No {} record found matching the query", table),
        )
        .with_table(&table)
        .with_suggestion("Use first() instead to get None instead of an error")
    }

    /// Create a not unique error.
    pub fn not_unique(table: impl Into<String>) -> Self {
        let table = table.into();
        Self::new(
            ErrorCode::NotUnique,
            format!("Expected exactly one {} record but found multiple", table),
        )
        .with_table(&table)
        .with_suggestion("Add more specific filters to narrow down to a single record")
    }

    /// Create an invalid identifier error naming the offending field.
    pub fn invalid_identifier(kind: &str, identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self::new(
            ErrorCode::InvalidIdentifier,
            format!("Invalid {} name: {:?}", kind, identifier),
        )
        .with_field(identifier)
        .with_help("Identifiers may contain letters, digits and underscores, optionally qualified with '.'")
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        Self::new(
            ErrorCode::InvalidArgument,
            format!("Invalid argument for {}: {}", field, message),
        )
        .with_field(field)
    }

    /// Create an invalid operator error.
    pub fn invalid_operator(operator: impl Into<String>) -> Self {
        let operator = operator.into();
        Self::new(
            ErrorCode::InvalidOperator,
            format!("Unsupported comparison operator: {:?}", operator),
        )
        .with_suggestion("Use one of =, !=, <>, <, <=, >, >=, LIKE, NOT LIKE, ILIKE")
    }

    /// Create a binding mismatch error for raw SQL fragments.
    pub fn binding_mismatch(placeholders: usize, bindings: usize) -> Self {
        Self::new(
            ErrorCode::BindingMismatch,
            format!(
                "Raw SQL has {} placeholder(s) but {} binding(s) were supplied",
                placeholders, bindings
            ),
        )
        .with_help("Use one '?' per bound value in raw fragments")
    }

    /// Create an invalid cache options error.
    pub fn invalid_cache_options(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidCacheOptions, message)
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message)
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::ConnectionFailed, format!("Connection error: {}", message))
            .with_suggestion("Check that the database server is running")
    }

    /// Create a query timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::new(
            ErrorCode::QueryTimeout,
            format!("Query timed out after {}ms", duration_ms),
        )
    }

    /// Create a SQL syntax error.
    pub fn sql_syntax(message: impl Into<String>, sql: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::SqlSyntax, format!("SQL syntax error: {}", message)).with_sql(sql)
    }

    /// Create a general database error.
    pub fn database(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::SerializationError, format!("Serialization error: {}", message))
    }

    /// Create a deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::DeserializationError, format!("Deserialization error: {}", message))
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message))
    }

    // ============== Error Category Checks ==============

    /// Check if this error was raised by local validation before any I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::InvalidIdentifier
                | ErrorCode::InvalidArgument
                | ErrorCode::InvalidOperator
                | ErrorCode::BindingMismatch
                | ErrorCode::InvalidCacheOptions
        )
    }

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::RecordNotFound
    }

    /// Check if this is an ambiguity error from `sole()`.
    pub fn is_not_unique(&self) -> bool {
        self.code == ErrorCode::NotUnique
    }

    /// Check if the database rejected the statement.
    pub fn is_database_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::DatabaseError | ErrorCode::SqlSyntax | ErrorCode::QueryTimeout
        )
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ConnectionFailed | ErrorCode::ConnectionTimeout
        )
    }

    /// Check if the operation can be retried by outer middleware.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ConnectionFailed | ErrorCode::ConnectionTimeout | ErrorCode::QueryTimeout
        )
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::serialization(err.to_string()).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::RecordNotFound.code(), "Q1001");
        assert_eq!(ErrorCode::InvalidIdentifier.code(), "Q1003");
        assert_eq!(ErrorCode::ConnectionFailed.code(), "Q3001");
    }

    #[test]
    fn test_not_found_error() {
        let err = QueryError::not_found("users");
        assert!(err.is_not_found());
        assert!(!err.is_validation());
        assert!(err.message.contains("users"));
        assert_eq!(err.context.table.as_deref(), Some("users"));
    }

    #[test]
    fn test_invalid_identifier_names_field() {
        let err = QueryError::invalid_identifier("column", "id; --");
        assert!(err.is_validation());
        assert_eq!(err.context.field.as_deref(), Some("id; --"));
        assert!(err.to_string().starts_with("[Q1003]"));
    }

    #[test]
    fn test_attach_statement_keeps_existing_sql() {
        let err = QueryError::sql_syntax("near FROM", "SELECT FROM")
            .attach_statement("SELECT * FROM users", &[SqlValue::Int(1)]);
        assert_eq!(err.context.sql.as_deref(), Some("SELECT FROM"));
        assert_eq!(err.context.bindings, Some(vec![SqlValue::Int(1)]));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(QueryError::timeout(1000).is_retryable());
        assert!(QueryError::connection("refused").is_retryable());
        assert!(!QueryError::not_unique("users").is_retryable());
        assert!(!QueryError::database("relation does not exist").is_retryable());
    }
}
