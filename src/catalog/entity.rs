use crate::error::{Result, SfTapError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

static IDENTIFIER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)*$")
        .expect("identifier pattern regex is valid")
});

pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER_PATTERN.is_match(s)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Date,
    Datetime,
    Object,
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Number)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::Datetime)
    }

    fn json_schema(&self) -> Value {
        match self {
            FieldType::String => json!({ "type": ["string", "null"] }),
            FieldType::Integer => json!({ "type": ["integer", "null"] }),
            FieldType::Number => json!({ "type": ["number", "null"] }),
            FieldType::Boolean => json!({ "type": ["boolean", "null"] }),
            FieldType::Date => json!({ "type": ["string", "null"], "format": "date" }),
            FieldType::Datetime => json!({ "type": ["string", "null"], "format": "date-time" }),
            FieldType::Object => json!({ "type": ["object", "string", "null"] }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Static description of one CRM object: what to select and how to replicate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub replication_key: Option<String>,
    pub fields: Vec<FieldDef>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            primary_key: vec!["Id".to_string()],
            replication_key: None,
            fields,
        }
    }

    pub fn with_replication_key(mut self, key: impl Into<String>) -> Self {
        self.replication_key = Some(key.into());
        self
    }

    pub fn with_primary_key(mut self, key: Vec<String>) -> Self {
        self.primary_key = key;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn numeric_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.field_type.is_numeric())
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn replication_field(&self) -> Option<&FieldDef> {
        self.replication_key.as_deref().and_then(|k| self.field(k))
    }

    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.name) {
            return Err(SfTapError::InvalidIdentifier(format!(
                "entity name '{}'",
                self.name
            )));
        }
        if self.fields.is_empty() {
            return Err(SfTapError::Config(format!(
                "Entity '{}' declares no fields",
                self.name
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if !is_identifier(&field.name) {
                return Err(SfTapError::InvalidIdentifier(format!(
                    "field '{}' of entity '{}'",
                    field.name, self.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SfTapError::Config(format!(
                    "Entity '{}' declares field '{}' twice",
                    self.name, field.name
                )));
            }
        }

        if let Some(key) = &self.replication_key {
            if self.field(key).is_none() {
                return Err(SfTapError::Config(format!(
                    "Replication key '{}' is not a field of entity '{}'",
                    key, self.name
                )));
            }
        }

        for key in &self.primary_key {
            if self.field(key).is_none() {
                return Err(SfTapError::Config(format!(
                    "Primary key '{}' is not a field of entity '{}'",
                    key, self.name
                )));
            }
        }

        Ok(())
    }

    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.field_type.json_schema()))
            .collect();

        json!({
            "type": "object",
            "properties": properties,
        })
    }
}
