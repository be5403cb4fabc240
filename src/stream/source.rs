use super::query::QuerySpec;
use crate::decode::Row;
use crate::error::Result;
use futures::stream::BoxStream;

/// Something that can run a query and hand back its rows lazily.
pub trait RowSource: Send + Sync {
    fn rows<'a>(&'a self, query: &'a QuerySpec) -> BoxStream<'a, Result<Row>>;

    /// Short label for logs, e.g. `bulk` or `rest`.
    fn mode(&self) -> &'static str;
}
