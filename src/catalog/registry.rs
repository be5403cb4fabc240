use super::entity::EntitySchema;
use crate::error::{Result, SfTapError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCatalog {
    #[serde(default)]
    pub entities: Vec<EntitySchema>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: Vec<EntitySchema>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(entities: Vec<EntitySchema>) -> Result<Self> {
        let mut index = HashMap::with_capacity(entities.len());
        for (i, entity) in entities.iter().enumerate() {
            entity.validate()?;
            if index.insert(entity.name.clone(), i).is_some() {
                return Err(SfTapError::Config(format!(
                    "Entity '{}' is declared more than once in the catalog",
                    entity.name
                )));
            }
        }
        Ok(Self { entities, index })
    }

    pub fn get(&self, name: &str) -> Option<&EntitySchema> {
        self.index.get(name).map(|&i| &self.entities[i])
    }

    pub fn entities(&self) -> &[EntitySchema] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities to extract, in catalog order. An empty selection means all of them.
    pub fn select(&self, names: &[String]) -> Result<Vec<&EntitySchema>> {
        if names.is_empty() {
            return Ok(self.entities.iter().collect());
        }

        for name in names {
            if !self.index.contains_key(name) {
                return Err(SfTapError::EntityNotFound(name.clone()));
            }
        }

        Ok(self
            .entities
            .iter()
            .filter(|e| names.contains(&e.name))
            .collect())
    }
}
