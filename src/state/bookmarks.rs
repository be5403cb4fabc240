use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Read/write access to per-entity checkpoints, owned by whoever persists them.
pub trait CheckpointStore {
    fn checkpoint(&self, entity: &str) -> Option<String>;
    fn set_checkpoint(&mut self, entity: &str, replication_key: &str, value: &str);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TapState {
    #[serde(default)]
    pub bookmarks: BTreeMap<String, Bookmark>,
}

impl TapState {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Missing file means first run.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl CheckpointStore for TapState {
    fn checkpoint(&self, entity: &str) -> Option<String> {
        self.bookmarks
            .get(entity)
            .and_then(|b| b.replication_key_value.clone())
    }

    fn set_checkpoint(&mut self, entity: &str, replication_key: &str, value: &str) {
        self.bookmarks.insert(
            entity.to_string(),
            Bookmark {
                replication_key: Some(replication_key.to_string()),
                replication_key_value: Some(value.to_string()),
            },
        );
    }
}
