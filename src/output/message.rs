use crate::catalog::EntitySchema;
use crate::decode::Record;
use crate::error::Result;
use crate::state::TapState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    Schema {
        stream: String,
        schema: Value,
        key_properties: Vec<String>,
        #[serde(default)]
        bookmark_properties: Vec<String>,
    },
    Record {
        stream: String,
        record: Record,
        time_extracted: DateTime<Utc>,
    },
    State {
        value: Value,
    },
}

impl Message {
    pub fn schema(entity: &EntitySchema) -> Self {
        Message::Schema {
            stream: entity.name.clone(),
            schema: entity.json_schema(),
            key_properties: entity.primary_key.clone(),
            bookmark_properties: entity.replication_key.iter().cloned().collect(),
        }
    }

    pub fn record(stream: &str, record: Record) -> Self {
        Message::Record {
            stream: stream.to_string(),
            record,
            time_extracted: Utc::now(),
        }
    }

    pub fn state(value: Value) -> Self {
        Message::State { value }
    }
}

pub trait MessageSink {
    fn write(&mut self, message: &Message) -> Result<()>;
}

/// One JSON document per line. Flushes after every state message so a
/// checkpoint never sits in a buffer ahead of its records.
pub struct JsonLinesWriter<W: Write> {
    out: W,
    state_file: Option<PathBuf>,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            state_file: None,
        }
    }

    /// Also persists each state message to `path` once it has been flushed,
    /// so finished entities keep their checkpoints if the run dies later.
    pub fn with_state_file(mut self, path: Option<PathBuf>) -> Self {
        self.state_file = path;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> MessageSink for JsonLinesWriter<W> {
    fn write(&mut self, message: &Message) -> Result<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        if let Message::State { value } = message {
            self.out.flush()?;
            if let Some(path) = &self.state_file {
                let state: TapState = serde_json::from_value(value.clone())?;
                state.save(path)?;
                debug!(path = %path.display(), "State saved");
            }
        }
        Ok(())
    }
}

/// Keeps messages in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub messages: Vec<Message>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records_for(&self, stream_name: &str) -> Vec<&Record> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::Record { stream, record, .. } if stream == stream_name => Some(record),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<&Value> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::State { value } => Some(value),
                _ => None,
            })
            .collect()
    }
}

impl MessageSink for CollectingSink {
    fn write(&mut self, message: &Message) -> Result<()> {
        self.messages.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, FieldType};
    use serde_json::json;

    #[test]
    fn test_schema_message_shape() {
        let entity = EntitySchema::new(
            "Account",
            vec![
                FieldDef::new("Id", FieldType::String),
                FieldDef::new("LastModifiedDate", FieldType::Datetime),
            ],
        )
        .with_replication_key("LastModifiedDate");

        let value = serde_json::to_value(Message::schema(&entity)).unwrap();

        assert_eq!(value["type"], "SCHEMA");
        assert_eq!(value["stream"], "Account");
        assert_eq!(value["key_properties"], json!(["Id"]));
        assert_eq!(value["bookmark_properties"], json!(["LastModifiedDate"]));
    }

    #[test]
    fn test_json_lines_output() {
        let mut writer = JsonLinesWriter::new(Vec::new());
        let mut record = Record::new();
        record.insert("Id".to_string(), json!("001"));

        writer.write(&Message::record("Account", record)).unwrap();
        writer
            .write(&Message::state(json!({"bookmarks": {}})))
            .unwrap();

        let out = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Message = serde_json::from_str(lines[0]).unwrap();
        assert!(matches!(first, Message::Record { ref stream, .. } if stream == "Account"));
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["type"], "STATE");
    }

    #[test]
    fn test_state_file_written_per_state_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut writer = JsonLinesWriter::new(Vec::new()).with_state_file(Some(path.clone()));

        writer.write(&Message::record("Account", Record::new())).unwrap();
        assert!(!path.exists());

        let value = json!({"bookmarks": {"Account": {
            "replication_key": "LastModifiedDate",
            "replication_key_value": "2023-06-01T00:00:00Z"
        }}});
        writer.write(&Message::state(value)).unwrap();

        let saved = TapState::load(&path).unwrap();
        assert_eq!(
            saved.bookmarks["Account"].replication_key_value.as_deref(),
            Some("2023-06-01T00:00:00Z")
        );
    }
}
