mod entity;
mod query;
mod source;
mod watermark;

pub use entity::{EntityStream, StreamSyncStats};
pub use query::{soql_literal, QuerySpec, WatermarkPredicate};
pub use source::RowSource;
pub use watermark::{advance_checkpoint, compare_watermarks, parse_instant, WatermarkTracker};
