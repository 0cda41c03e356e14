//! Database-specific rendering rules.
//!
//! A [`DialectProfile`] tells the compiler how to quote identifiers, how to
//! spell parameter placeholders and which date functions to use. The
//! built-in [`Dialect`] enum covers PostgreSQL, MySQL, SQLite and SQL Server;
//! callers with other targets can implement the trait themselves.
//!
//! ```rust
//! use quarry_query::dialect::{Dialect, DialectProfile};
//!
//! assert_eq!(Dialect::PostgreSQL.placeholder(2), "$2");
//! assert_eq!(Dialect::MySQL.placeholder(2), "?");
//! assert_eq!(Dialect::MySQL.escape_identifier("users.id"), "`users`.`id`");
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;

/// Rendering rules for one database.
pub trait DialectProfile: Send + Sync + fmt::Debug {
    /// Human-readable dialect name.
    fn name(&self) -> &'static str;

    /// Quote a single identifier part.
    fn quote_part(&self, part: &str) -> String;

    /// Placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Expression extracting the calendar date of `expr`.
    fn date_of(&self, expr: &str) -> String;

    /// Expression extracting the year of `expr` as an integer.
    fn year_of(&self, expr: &str) -> String;

    /// Expression extracting the month of `expr` as an integer.
    fn month_of(&self, expr: &str) -> String;

    /// Expression extracting the day of month of `expr` as an integer.
    fn day_of(&self, expr: &str) -> String;

    /// Expression for today's date on the server.
    fn current_date(&self) -> String;

    /// Expression for the server date `days` days ago.
    fn date_minus_days(&self, days: u32) -> String;

    /// Quote a possibly qualified identifier (`schema.table.column`).
    ///
    /// `*` is left bare so `users.*` stays valid.
    fn escape_identifier(&self, name: &str) -> String {
        name.split('.')
            .map(|part| {
                if part == "*" {
                    part.to_string()
                } else {
                    self.quote_part(part)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Render the paging suffix. Returns an empty string when neither bound
    /// is set.
    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>, _has_order: bool) -> String {
        standard_limit_offset(limit, offset)
    }
}

fn standard_limit_offset(limit: Option<u64>, offset: Option<u64>) -> String {
    let mut out = String::new();
    if let Some(limit) = limit {
        out.push_str(&format!("LIMIT {}", limit));
    }
    if let Some(offset) = offset {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&format!("OFFSET {}", offset));
    }
    out
}

/// The built-in dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// PostgreSQL uses `"ident"` and `$1, $2, ...`.
    #[default]
    PostgreSQL,
    /// MySQL / MariaDB use `` `ident` `` and `?`.
    MySQL,
    /// SQLite uses `"ident"` and `?`.
    SQLite,
    /// SQL Server uses `[ident]` and `@P1, @P2, ...`.
    MSSQL,
}

impl DialectProfile for Dialect {
    fn name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "postgresql",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
            Self::MSSQL => "mssql",
        }
    }

    fn quote_part(&self, part: &str) -> String {
        match self {
            Self::PostgreSQL | Self::SQLite => format!("\"{}\"", part.replace('"', "\"\"")),
            Self::MySQL => format!("`{}`", part.replace('`', "``")),
            Self::MSSQL => format!("[{}]", part.replace(']', "]]")),
        }
    }

    fn placeholder(&self, index: usize) -> String {
        match self {
            Self::PostgreSQL => format!("${}", index),
            Self::MySQL | Self::SQLite => "?".to_string(),
            Self::MSSQL => format!("@P{}", index),
        }
    }

    fn date_of(&self, expr: &str) -> String {
        match self {
            Self::PostgreSQL | Self::MSSQL => format!("CAST({} AS DATE)", expr),
            Self::MySQL | Self::SQLite => format!("DATE({})", expr),
        }
    }

    fn year_of(&self, expr: &str) -> String {
        match self {
            Self::PostgreSQL => format!("EXTRACT(YEAR FROM {})", expr),
            Self::MySQL | Self::MSSQL => format!("YEAR({})", expr),
            Self::SQLite => format!("CAST(strftime('%Y', {}) AS INTEGER)", expr),
        }
    }

    fn month_of(&self, expr: &str) -> String {
        match self {
            Self::PostgreSQL => format!("EXTRACT(MONTH FROM {})", expr),
            Self::MySQL | Self::MSSQL => format!("MONTH({})", expr),
            Self::SQLite => format!("CAST(strftime('%m', {}) AS INTEGER)", expr),
        }
    }

    fn day_of(&self, expr: &str) -> String {
        match self {
            Self::PostgreSQL => format!("EXTRACT(DAY FROM {})", expr),
            Self::MySQL | Self::MSSQL => format!("DAY({})", expr),
            Self::SQLite => format!("CAST(strftime('%d', {}) AS INTEGER)", expr),
        }
    }

    fn current_date(&self) -> String {
        match self {
            Self::PostgreSQL => "CURRENT_DATE".to_string(),
            Self::MySQL => "CURDATE()".to_string(),
            Self::SQLite => "DATE('now')".to_string(),
            Self::MSSQL => "CAST(GETDATE() AS DATE)".to_string(),
        }
    }

    fn date_minus_days(&self, days: u32) -> String {
        match self {
            Self::PostgreSQL => format!("CURRENT_DATE - INTERVAL '{} days'", days),
            Self::MySQL => format!("DATE_SUB(CURDATE(), INTERVAL {} DAY)", days),
            Self::SQLite => format!("DATE('now', '-{} days')", days),
            Self::MSSQL => format!("DATEADD(day, -{}, CAST(GETDATE() AS DATE))", days),
        }
    }

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>, has_order: bool) -> String {
        match self {
            Self::MSSQL => {
                if limit.is_none() && offset.is_none() {
                    return String::new();
                }
                // OFFSET/FETCH is only legal after ORDER BY.
                let mut out = String::new();
                if !has_order {
                    out.push_str("ORDER BY (SELECT NULL) ");
                }
                out.push_str(&format!("OFFSET {} ROWS", offset.unwrap_or(0)));
                if let Some(limit) = limit {
                    out.push_str(&format!(" FETCH NEXT {} ROWS ONLY", limit));
                }
                out
            }
            _ => standard_limit_offset(limit, offset),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::PostgreSQL),
            "mysql" | "mariadb" => Ok(Self::MySQL),
            "sqlite" | "sqlite3" => Ok(Self::SQLite),
            "mssql" | "sqlserver" | "sql_server" => Ok(Self::MSSQL),
            other => Err(QueryError::invalid_configuration(format!(
                "Unknown SQL dialect: {:?}",
                other
            ))),
        }
    }
}
