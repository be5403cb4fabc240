use super::scope::SyncScope;
use crate::bulk::BulkJobController;
use crate::catalog::{Catalog, EntitySchema};
use crate::config::TapConfig;
use crate::error::{Operation, Result};
use crate::http::HttpTransport;
use crate::output::{Message, MessageSink};
use crate::rest::RestQueryClient;
use crate::state::CheckpointStore;
use crate::stream::{EntityStream, QuerySpec, RowSource, StreamSyncStats};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

#[derive(Debug)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub stats: Vec<StreamSyncStats>,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total_records(&self) -> u64 {
        self.stats.iter().map(|s| s.records).sum()
    }
}

#[derive(Debug)]
pub struct SyncFailure {
    pub entity: String,
    pub operation: Option<Operation>,
    pub error: String,
}

/// Extracts the selected entities one after another. A failing entity is
/// recorded and skipped; the rest still run.
pub struct SyncRunner {
    source: Arc<dyn RowSource>,
    scope: SyncScope,
}

impl SyncRunner {
    pub fn new(source: Arc<dyn RowSource>, catalog: Catalog) -> Self {
        Self::with_scope(source, SyncScope::new(catalog))
    }

    pub fn with_scope(source: Arc<dyn RowSource>, scope: SyncScope) -> Self {
        Self { source, scope }
    }

    /// Picks bulk or REST extraction from `bulk_load` and applies the
    /// configured date bounds and entity selection.
    pub fn from_config(
        config: &TapConfig,
        catalog: Catalog,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let api_base = config.api_base()?;
        let source: Arc<dyn RowSource> = if config.bulk_load {
            Arc::new(BulkJobController::new(
                transport,
                &api_base,
                config.bulk.clone(),
            ))
        } else {
            Arc::new(RestQueryClient::new(
                transport,
                &config.instance_url()?,
                &api_base,
            ))
        };

        Ok(Self::with_scope(
            source,
            SyncScope::from_config(config, catalog),
        ))
    }

    pub fn with_entities(mut self, entities: Vec<String>) -> Self {
        self.scope = self.scope.with_entities(entities);
        self
    }

    pub fn with_start_date(mut self, start_date: Option<String>) -> Self {
        self.scope = self.scope.with_start_date(start_date);
        self
    }

    pub fn with_end_date(mut self, end_date: Option<String>) -> Self {
        self.scope = self.scope.with_end_date(end_date);
        self
    }

    pub fn scope(&self) -> &SyncScope {
        &self.scope
    }

    pub fn catalog(&self) -> &Catalog {
        self.scope.catalog()
    }

    pub fn mode(&self) -> &'static str {
        self.source.mode()
    }

    fn entity_stream<'a, S: CheckpointStore>(
        &'a self,
        schema: &'a EntitySchema,
        state: &S,
    ) -> EntityStream<'a> {
        let checkpoint = self.scope.resume_point(&schema.name, state);
        EntityStream::new(schema, self.source.as_ref(), checkpoint)
            .with_end_date(self.scope.end_date().map(str::to_string))
    }

    pub fn query_for<S: CheckpointStore>(&self, entity: &str, state: &S) -> Result<QuerySpec> {
        self.scope.query_for(entity, state)
    }

    pub async fn run<S, M>(&self, state: &mut S, sink: &mut M) -> Result<SyncReport>
    where
        S: CheckpointStore + Serialize,
        M: MessageSink,
    {
        let run_id = Uuid::new_v4();
        let selected = self.scope.selected()?;

        async {
            info!(entities = selected.len(), mode = self.mode(), "Starting sync");

            let mut stats = Vec::new();
            let mut failures = Vec::new();

            for schema in selected {
                match self.run_entity(schema, state, sink).await {
                    Ok(s) => stats.push(s),
                    Err(e) => {
                        error!(
                            entity = %schema.name,
                            operation = e.operation().map(|o| o.as_str()).unwrap_or("-"),
                            transport = e.is_transport(),
                            error = %e,
                            "Entity extraction failed"
                        );
                        failures.push(SyncFailure {
                            entity: schema.name.clone(),
                            operation: e.operation(),
                            error: e.to_string(),
                        });
                    }
                }
            }

            let report = SyncReport {
                run_id,
                stats,
                failures,
            };
            info!(
                records = report.total_records(),
                succeeded = report.stats.len(),
                failed = report.failures.len(),
                "Sync finished"
            );
            Ok(report)
        }
        .instrument(info_span!("sync", run_id = %run_id))
        .await
    }

    pub async fn run_entity<S, M>(
        &self,
        schema: &EntitySchema,
        state: &mut S,
        sink: &mut M,
    ) -> Result<StreamSyncStats>
    where
        S: CheckpointStore + Serialize,
        M: MessageSink,
    {
        sink.write(&Message::schema(schema))?;

        let mut stream = self.entity_stream(schema, state);
        let stats = stream
            .sync(|record| sink.write(&Message::record(&schema.name, record)))
            .await?;

        if stats.checkpoint_advanced() {
            if let (Some(key), Some(value)) = (&schema.replication_key, stream.checkpoint()) {
                state.set_checkpoint(&schema.name, key, value);
                info!(entity = %schema.name, checkpoint = %value, "Checkpoint advanced");
            }
        }
        sink.write(&Message::state(serde_json::to_value(&*state)?))?;

        Ok(stats)
    }
}
