use crate::catalog::{Catalog, EntitySchema};
use crate::config::TapConfig;
use crate::error::{Result, SfTapError};
use crate::state::CheckpointStore;
use crate::stream::QuerySpec;

/// Which entities a run covers and the date bounds their queries use.
#[derive(Debug, Clone)]
pub struct SyncScope {
    catalog: Catalog,
    selection: Vec<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

impl SyncScope {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            selection: Vec::new(),
            start_date: None,
            end_date: None,
        }
    }

    pub fn from_config(config: &TapConfig, catalog: Catalog) -> Self {
        Self::new(catalog)
            .with_entities(config.entities.clone())
            .with_start_date(config.start_date.clone())
            .with_end_date(config.end_date.clone())
    }

    pub fn with_entities(mut self, entities: Vec<String>) -> Self {
        self.selection = entities;
        self
    }

    pub fn with_start_date(mut self, start_date: Option<String>) -> Self {
        self.start_date = start_date;
        self
    }

    pub fn with_end_date(mut self, end_date: Option<String>) -> Self {
        self.end_date = end_date;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn end_date(&self) -> Option<&str> {
        self.end_date.as_deref()
    }

    pub fn selected(&self) -> Result<Vec<&EntitySchema>> {
        self.catalog.select(&self.selection)
    }

    /// Stored checkpoint for `entity`, falling back to the configured start date.
    pub fn resume_point<S: CheckpointStore>(&self, entity: &str, state: &S) -> Option<String> {
        state
            .checkpoint(entity)
            .or_else(|| self.start_date.clone())
    }

    /// The query a run would submit for `entity` right now.
    pub fn query_for<S: CheckpointStore>(&self, entity: &str, state: &S) -> Result<QuerySpec> {
        let schema = self
            .catalog
            .get(entity)
            .ok_or_else(|| SfTapError::EntityNotFound(entity.to_string()))?;
        let checkpoint = self.resume_point(entity, state);
        Ok(QuerySpec::for_entity(
            schema,
            checkpoint.as_deref(),
            self.end_date(),
        ))
    }
}
