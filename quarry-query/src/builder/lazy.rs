//! Streaming reads.

use futures::stream::{self, Stream, TryStreamExt};

use super::QueryBuilder;
use crate::error::{QueryError, QueryResult};
use crate::value::Row;

impl QueryBuilder {
    /// Stream matching rows, fetching `size` rows per round trip.
    ///
    /// The stream is forward-only and finite: it ends after the first short
    /// page. It only suspends between page fetches. Calling `lazy` again
    /// starts over from the first page.
    ///
    /// ```rust,no_run
    /// # use quarry_query::prelude::*;
    /// use futures::TryStreamExt;
    ///
    /// # async fn demo(engine: Engine) -> QueryResult<()> {
    /// let users = engine.table("users")?.order_by("id")?;
    /// let mut rows = std::pin::pin!(users.lazy(500)?);
    /// while let Some(row) = rows.try_next().await? {
    ///     println!("{}", row["id"]);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn lazy(&self, size: u64) -> QueryResult<impl Stream<Item = QueryResult<Row>> + '_> {
        if size == 0 {
            return Err(QueryError::invalid_argument("size", "page size must be at least 1"));
        }
        let pages = stream::try_unfold(Some(0u64), move |next| async move {
            let Some(offset) = next else {
                return Ok::<_, QueryError>(None);
            };
            let rows = self.fetch_page(offset, size).await?;
            if rows.is_empty() {
                return Ok(None);
            }
            let following = ((rows.len() as u64) == size).then_some(offset + size);
            Ok(Some((rows, following)))
        });
        Ok(pages
            .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<Row, QueryError>)))
            .try_flatten())
    }
}
