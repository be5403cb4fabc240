use super::query::QuerySpec;
use super::source::RowSource;
use super::watermark::{advance_checkpoint, WatermarkTracker};
use crate::catalog::EntitySchema;
use crate::decode::{shape_record, Record};
use crate::error::Result;
use futures::TryStreamExt;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone)]
pub struct StreamSyncStats {
    pub entity: String,
    pub records: u64,
    pub checkpoint_before: Option<String>,
    pub checkpoint_after: Option<String>,
    pub elapsed: Duration,
}

impl StreamSyncStats {
    pub fn checkpoint_advanced(&self) -> bool {
        self.checkpoint_before != self.checkpoint_after
    }
}

/// One entity's extraction: builds its query from the checkpoint, streams
/// typed records out, and moves the checkpoint once the run succeeds.
pub struct EntityStream<'a> {
    schema: &'a EntitySchema,
    source: &'a dyn RowSource,
    checkpoint: Option<String>,
    end_date: Option<String>,
}

impl<'a> EntityStream<'a> {
    pub fn new(
        schema: &'a EntitySchema,
        source: &'a dyn RowSource,
        checkpoint: Option<String>,
    ) -> Self {
        Self {
            schema,
            source,
            checkpoint,
            end_date: None,
        }
    }

    pub fn with_end_date(mut self, end_date: Option<String>) -> Self {
        self.end_date = end_date;
        self
    }

    pub fn schema(&self) -> &EntitySchema {
        self.schema
    }

    pub fn checkpoint(&self) -> Option<&str> {
        self.checkpoint.as_deref()
    }

    pub fn query(&self) -> QuerySpec {
        QuerySpec::for_entity(
            self.schema,
            self.checkpoint.as_deref(),
            self.end_date.as_deref(),
        )
    }

    /// Hands each record to `emit` as soon as it is decoded. Records already
    /// emitted stay emitted if the run fails later; the checkpoint only moves
    /// after the last row.
    pub async fn sync<F>(&mut self, mut emit: F) -> Result<StreamSyncStats>
    where
        F: FnMut(Record) -> Result<()>,
    {
        let schema = self.schema;
        let source = self.source;
        let query = self.query();
        let started = Instant::now();

        info!(
            entity = %schema.name,
            mode = source.mode(),
            checkpoint = self.checkpoint.as_deref().unwrap_or("-"),
            soql = %query.to_soql(),
            "Starting entity extraction"
        );

        let mut tracker = WatermarkTracker::new();
        let mut records = 0u64;
        let mut rows = source.rows(&query);

        while let Some(row) = rows.try_next().await? {
            let record = shape_record(schema, row);
            if let Some(key) = &schema.replication_key {
                match record.get(key) {
                    Some(Value::String(s)) => tracker.observe(s),
                    Some(Value::Number(n)) => tracker.observe(&n.to_string()),
                    _ => {}
                }
            }
            emit(record)?;
            records += 1;
        }
        drop(rows);

        let checkpoint_before = self.checkpoint.clone();
        if schema.replication_key.is_some() {
            self.checkpoint = advance_checkpoint(self.checkpoint.as_deref(), tracker.max());
        }

        let stats = StreamSyncStats {
            entity: schema.name.clone(),
            records,
            checkpoint_before,
            checkpoint_after: self.checkpoint.clone(),
            elapsed: started.elapsed(),
        };

        info!(
            entity = %schema.name,
            records,
            checkpoint = stats.checkpoint_after.as_deref().unwrap_or("-"),
            advanced = stats.checkpoint_advanced(),
            "Finished entity extraction"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, FieldType};
    use crate::decode::Row;
    use crate::error::SfTapError;
    use futures::stream::{self, BoxStream, StreamExt};
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves fixed rows and remembers the SOQL it was asked to run.
    struct StaticSource {
        rows: Vec<Result<Row>>,
        seen: Mutex<Vec<String>>,
    }

    impl StaticSource {
        fn new(rows: Vec<Result<Row>>) -> Self {
            Self {
                rows,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl RowSource for StaticSource {
        fn rows<'a>(&'a self, query: &'a QuerySpec) -> BoxStream<'a, Result<Row>> {
            self.seen.lock().unwrap().push(query.to_soql());
            let items: Vec<Result<Row>> = self
                .rows
                .iter()
                .map(|r| match r {
                    Ok(row) => Ok(row.clone()),
                    Err(e) => Err(SfTapError::Config(e.to_string())),
                })
                .collect();
            stream::iter(items).boxed()
        }

        fn mode(&self) -> &'static str {
            "static"
        }
    }

    fn account() -> EntitySchema {
        EntitySchema::new(
            "Account",
            vec![
                FieldDef::new("Id", FieldType::String),
                FieldDef::new("AnnualRevenue", FieldType::Number),
                FieldDef::new("LastModifiedDate", FieldType::Datetime),
            ],
        )
        .with_replication_key("LastModifiedDate")
    }

    fn row(id: &str, revenue: &str, modified: &str) -> Result<Row> {
        let mut r = Row::new();
        r.insert("Id".to_string(), json!(id));
        r.insert("AnnualRevenue".to_string(), json!(revenue));
        r.insert("LastModifiedDate".to_string(), json!(modified));
        Ok(r)
    }

    #[tokio::test]
    async fn test_checkpoint_moves_to_max_observed() {
        let schema = account();
        let source = StaticSource::new(vec![
            row("001", "10", "2023-06-01"),
            row("002", "", "2023-05-01"),
        ]);
        let mut entity = EntityStream::new(&schema, &source, Some("2023-01-01T00:00:00Z".into()));

        let mut emitted = Vec::new();
        let stats = entity
            .sync(|r| {
                emitted.push(r);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(stats.records, 2);
        assert_eq!(entity.checkpoint(), Some("2023-06-01"));
        assert!(stats.checkpoint_advanced());
        assert_eq!(emitted[0]["AnnualRevenue"], json!(10));
        assert_eq!(emitted[1]["AnnualRevenue"], Value::Null);
        assert!(source.seen.lock().unwrap()[0]
            .contains("WHERE LastModifiedDate > 2023-01-01T00:00:00Z ORDER BY LastModifiedDate ASC"));
    }

    #[tokio::test]
    async fn test_no_records_leaves_checkpoint() {
        let schema = account();
        let source = StaticSource::new(vec![]);
        let mut entity = EntityStream::new(&schema, &source, Some("2023-01-01T00:00:00Z".into()));

        let stats = entity.sync(|_| Ok(())).await.unwrap();

        assert_eq!(stats.records, 0);
        assert!(!stats.checkpoint_advanced());
        assert_eq!(entity.checkpoint(), Some("2023-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_failure_mid_stream_keeps_checkpoint() {
        let schema = account();
        let source = StaticSource::new(vec![
            row("001", "1", "2023-06-01"),
            Err(SfTapError::Config("page fetch failed".into())),
        ]);
        let mut entity = EntityStream::new(&schema, &source, Some("2023-01-01T00:00:00Z".into()));

        let mut emitted = 0;
        let result = entity
            .sync(|_| {
                emitted += 1;
                Ok(())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(emitted, 1);
        assert_eq!(entity.checkpoint(), Some("2023-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_emit_error_aborts_run() {
        let schema = account();
        let source = StaticSource::new(vec![row("001", "1", "2023-06-01")]);
        let mut entity = EntityStream::new(&schema, &source, None);

        let result = entity
            .sync(|_| Err(SfTapError::Config("sink closed".into())))
            .await;

        assert!(result.is_err());
        assert_eq!(entity.checkpoint(), None);
    }

    #[tokio::test]
    async fn test_full_table_entity_has_no_checkpoint() {
        let mut schema = account();
        schema.replication_key = None;
        let source = StaticSource::new(vec![row("001", "1", "2023-06-01")]);
        let mut entity = EntityStream::new(&schema, &source, None);

        entity.sync(|_| Ok(())).await.unwrap();

        assert_eq!(entity.checkpoint(), None);
        assert_eq!(
            source.seen.lock().unwrap()[0],
            "SELECT Id,AnnualRevenue,LastModifiedDate FROM Account"
        );
    }

    #[tokio::test]
    async fn test_duplicate_primary_keys_pass_through() {
        let schema = account();
        let source = StaticSource::new(vec![
            row("001", "1", "2023-02-01"),
            row("001", "2", "2023-03-01"),
        ]);
        let mut entity = EntityStream::new(&schema, &source, None);

        let stats = entity.sync(|_| Ok(())).await.unwrap();

        assert_eq!(stats.records, 2);
        assert_eq!(entity.checkpoint(), Some("2023-03-01"));
    }

    #[test]
    fn test_end_date_bounds_query() {
        let schema = account();
        let source = StaticSource::new(vec![]);
        let entity = EntityStream::new(&schema, &source, Some("2023-01-01T00:00:00Z".into()))
            .with_end_date(Some("2023-02-01T00:00:00Z".into()));

        assert!(entity
            .query()
            .to_soql()
            .contains("LastModifiedDate < 2023-02-01T00:00:00Z"));
    }
}
