//! Offset and cursor pagination.
//!
//! ```rust,no_run
//! # use quarry_query::prelude::*;
//! # async fn demo(engine: Engine) -> QueryResult<()> {
//! let page = engine.table("posts")?.latest("id")?.paginate(2, 20).await?;
//! println!("{} of {} pages", page.pagination.page, page.pagination.total_pages);
//!
//! let first = engine.table("posts")?.cursor_paginate("id", None::<i64>, 50).await?;
//! if let Some(cursor) = first.next_cursor {
//!     let next = engine.table("posts")?.cursor_paginate("id", Some(cursor), 50).await?;
//! }
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

use crate::builder::state::{Combinator, Fragment, OrderBySpec, SortOrder};
use crate::builder::{QueryBuilder, result_key};
use crate::error::{QueryError, QueryResult};
use crate::value::{Row, SqlValue};

/// Page position and totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// 1-based page number.
    pub page: u64,
    /// Rows per page.
    pub per_page: u64,
    /// Matching rows across all pages.
    pub total: u64,
    /// `ceil(total / per_page)`.
    pub total_pages: u64,
    /// Whether a later page exists.
    pub has_more: bool,
    /// 1-based position of the first row on this page, 0 when it is empty.
    pub from: u64,
    /// 1-based position of the last row on this page, 0 when it is empty.
    pub to: u64,
}

impl PageInfo {
    /// Compute page bounds. `page` and `per_page` must already be at least 1.
    /// A page whose offset overflows is past the end.
    pub fn new(page: u64, per_page: u64, total: u64) -> Self {
        let total_pages = total.div_ceil(per_page);
        let (from, to) = match (page - 1).checked_mul(per_page) {
            Some(offset) if offset < total => (offset + 1, offset.saturating_add(per_page).min(total)),
            _ => (0, 0),
        };
        Self {
            page,
            per_page,
            total,
            total_pages,
            has_more: page < total_pages,
            from,
            to,
        }
    }

    /// Rows skipped before this page.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

/// One page of rows plus its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Rows on this page.
    pub data: Vec<T>,
    /// Position and totals.
    pub pagination: PageInfo,
}

/// One cursor-addressed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPage {
    /// Rows on this page.
    pub data: Vec<Row>,
    /// Whether rows exist after this page.
    pub has_more: bool,
    /// Cursor value for the next call; set only when `has_more`.
    pub next_cursor: Option<SqlValue>,
}

impl QueryBuilder {
    /// Fetch one page and the total count.
    ///
    /// `page < 1` becomes 1; `per_page < 1` becomes the configured default.
    /// The count runs as a separate aggregate query.
    pub async fn paginate(&self, page: i64, per_page: i64) -> QueryResult<Paginated<Row>> {
        let page = u64::try_from(page).ok().filter(|p| *p >= 1).unwrap_or(1);
        let per_page = u64::try_from(per_page)
            .ok()
            .filter(|p| *p >= 1)
            .unwrap_or(self.engine.config.default_per_page.max(1));

        let total = self.count().await?;
        let info = PageInfo::new(page, per_page, total);
        let data = if info.from == 0 {
            Vec::new()
        } else {
            self.fetch_page(info.offset(), per_page).await?
        };
        Ok(Paginated { data, pagination: info })
    }

    /// Fetch up to `limit` rows with `column > cursor`, ordered by `column`.
    ///
    /// Existing ordering is replaced by `column ASC`. One extra row is
    /// fetched to detect whether more data exists.
    pub async fn cursor_paginate(
        &self,
        column: &str,
        cursor: Option<impl Into<SqlValue>>,
        limit: i64,
    ) -> QueryResult<CursorPage> {
        let limit = u64::try_from(limit)
            .ok()
            .filter(|l| *l >= 1)
            .ok_or_else(|| QueryError::invalid_argument("limit", format!("limit must be at least 1, got {}", limit)))?;
        let rendered = self.column_sql(column)?;

        let mut state = self.state.scratch();
        if let Some(cursor) = cursor {
            state.group_wheres();
            let mut fragment = Fragment::text(format!("{} > ", rendered));
            fragment.push_param();
            state.push_where(Combinator::And, fragment, vec![cursor.into()]);
        }
        state.orders = vec![OrderBySpec {
            column: rendered,
            direction: SortOrder::Asc,
            raw: false,
        }];
        state.limit = Some(limit + 1);
        state.offset = None;

        let mut data = self.fetch_state(&state).await?;
        let has_more = data.len() as u64 > limit;
        data.truncate(limit as usize);
        let next_cursor = if has_more {
            let key = result_key(column);
            data.last().and_then(|row| row.get(&key)).map(SqlValue::from)
        } else {
            None
        };
        Ok(CursorPage {
            data,
            has_more,
            next_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_info_math() {
        let first = PageInfo::new(1, 3, 8);
        assert_eq!((first.total_pages, first.has_more, first.from, first.to), (3, true, 1, 3));

        let last = PageInfo::new(3, 3, 8);
        assert_eq!((last.has_more, last.from, last.to, last.offset()), (false, 7, 8, 6));

        let empty = PageInfo::new(1, 15, 0);
        assert_eq!((empty.total_pages, empty.has_more, empty.from, empty.to), (0, false, 0, 0));

        let beyond = PageInfo::new(9, 3, 8);
        assert_eq!((beyond.from, beyond.to, beyond.has_more), (0, 0, false));
    }

    #[test]
    fn test_huge_pages_are_past_the_end() {
        let info = PageInfo::new(i64::MAX as u64, 1000, 8);
        assert_eq!((info.from, info.to, info.has_more), (0, 0, false));
        assert_eq!(info.offset(), u64::MAX);

        let wide = PageInfo::new(1, u64::MAX, 8);
        assert_eq!((wide.from, wide.to, wide.total_pages), (1, 8, 1));
    }
}
