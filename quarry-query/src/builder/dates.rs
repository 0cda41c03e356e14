//! Date-scoped predicates.
//!
//! Explicit dates are normalised to `YYYY-MM-DD` before binding, so the time
//! of day in the input never affects the comparison. Relative predicates
//! (`today`, `yesterday`, `last N days`) use the server's current date.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};

use super::QueryBuilder;
use super::state::{Combinator, Fragment};
use crate::error::{QueryError, QueryResult};
use crate::validation::validate_operator;
use crate::value::SqlValue;

/// Values usable as a calendar date.
pub trait IntoSqlDate {
    /// Resolve to a calendar date.
    fn into_sql_date(self) -> QueryResult<NaiveDate>;
}

impl IntoSqlDate for NaiveDate {
    fn into_sql_date(self) -> QueryResult<NaiveDate> {
        Ok(self)
    }
}

impl IntoSqlDate for NaiveDateTime {
    fn into_sql_date(self) -> QueryResult<NaiveDate> {
        Ok(self.date())
    }
}

impl<Tz: TimeZone> IntoSqlDate for DateTime<Tz> {
    fn into_sql_date(self) -> QueryResult<NaiveDate> {
        Ok(self.date_naive())
    }
}

impl IntoSqlDate for &str {
    fn into_sql_date(self) -> QueryResult<NaiveDate> {
        parse_date(self)
    }
}

impl IntoSqlDate for String {
    fn into_sql_date(self) -> QueryResult<NaiveDate> {
        parse_date(&self)
    }
}

fn parse_date(input: &str) -> QueryResult<NaiveDate> {
    let s = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    Err(QueryError::invalid_argument("date", format!("{:?} is not a recognizable date", input)))
}

fn date_value(date: impl IntoSqlDate) -> QueryResult<SqlValue> {
    Ok(SqlValue::String(date.into_sql_date()?.format("%Y-%m-%d").to_string()))
}

impl QueryBuilder {
    /// Compare the date part of `column` with `date`.
    pub fn where_date(self, column: &str, op: &str, date: impl IntoSqlDate) -> QueryResult<Self> {
        let value = date_value(date)?;
        self.date_compare(column, op, |d, c| d.date_of(c), value)
    }

    /// Compare the year of `column`.
    pub fn where_year(self, column: &str, op: &str, year: i32) -> QueryResult<Self> {
        self.date_compare(column, op, |d, c| d.year_of(c), SqlValue::from(year))
    }

    /// Compare the month (1-12) of `column`.
    pub fn where_month(self, column: &str, op: &str, month: u32) -> QueryResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(QueryError::invalid_argument("month", format!("month must be 1-12, got {}", month)));
        }
        self.date_compare(column, op, |d, c| d.month_of(c), SqlValue::from(month))
    }

    /// Compare the day of month (1-31) of `column`.
    pub fn where_day(self, column: &str, op: &str, day: u32) -> QueryResult<Self> {
        if !(1..=31).contains(&day) {
            return Err(QueryError::invalid_argument("day", format!("day must be 1-31, got {}", day)));
        }
        self.date_compare(column, op, |d, c| d.day_of(c), SqlValue::from(day))
    }

    /// Rows whose `column` falls on the server's current date.
    pub fn where_today(self, column: &str) -> QueryResult<Self> {
        let column = self.column_sql(column)?;
        let d = self.dialect();
        let sql = format!("{} = {}", d.date_of(&column), d.current_date());
        Ok(self.push_static(Combinator::And, sql))
    }

    /// Rows whose `column` falls on the day before the server's current date.
    pub fn where_yesterday(self, column: &str) -> QueryResult<Self> {
        let column = self.column_sql(column)?;
        let d = self.dialect();
        let sql = format!("{} = {}", d.date_of(&column), d.date_minus_days(1));
        Ok(self.push_static(Combinator::And, sql))
    }

    /// Rows whose `column` falls within the last `days` days, today included.
    pub fn where_last_days(self, column: &str, days: u32) -> QueryResult<Self> {
        let column = self.column_sql(column)?;
        let d = self.dialect();
        let sql = format!("{} >= {}", d.date_of(&column), d.date_minus_days(days));
        Ok(self.push_static(Combinator::And, sql))
    }

    /// Rows whose date part of `column` lies between `start` and `end`
    /// inclusive.
    pub fn where_between_dates(
        mut self,
        column: &str,
        start: impl IntoSqlDate,
        end: impl IntoSqlDate,
    ) -> QueryResult<Self> {
        let start = date_value(start)?;
        let end = date_value(end)?;
        let column = self.column_sql(column)?;
        let mut fragment = Fragment::text(format!("{} BETWEEN ", self.dialect().date_of(&column)));
        fragment.push_param().push_sql(" AND ").push_param();
        self.state.push_where(Combinator::And, fragment, vec![start, end]);
        Ok(self)
    }

    fn date_compare<F>(mut self, column: &str, op: &str, extract: F, value: SqlValue) -> QueryResult<Self>
    where
        F: FnOnce(&dyn crate::dialect::DialectProfile, &str) -> String,
    {
        let op = validate_operator(op)?;
        let column = self.column_sql(column)?;
        let mut fragment = Fragment::text(format!("{} {} ", extract(self.dialect(), &column), op));
        fragment.push_param();
        self.state.push_where(Combinator::And, fragment, vec![value]);
        Ok(self)
    }
}
