use super::watermark::parse_instant;
use crate::catalog::{EntitySchema, FieldType};

const SOQL_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const SOQL_DATE_FORMAT: &str = "%Y-%m-%d";

fn escape_soql_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Renders a watermark value as a literal comparable with a field of `field_type`.
pub fn soql_literal(value: &str, field_type: FieldType) -> String {
    match field_type {
        FieldType::Datetime => match parse_instant(value) {
            Some(instant) => instant.format(SOQL_DATETIME_FORMAT).to_string(),
            None => format!("'{}'", escape_soql_string(value)),
        },
        FieldType::Date => match parse_instant(value) {
            Some(instant) => instant.format(SOQL_DATE_FORMAT).to_string(),
            None => format!("'{}'", escape_soql_string(value)),
        },
        FieldType::Integer | FieldType::Number if value.trim().parse::<f64>().is_ok() => {
            value.trim().to_string()
        }
        _ => format!("'{}'", escape_soql_string(value)),
    }
}

/// Range filter on the replication key; the query is ordered by it even
/// when neither bound is set.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkPredicate {
    pub field: String,
    pub field_type: FieldType,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub entity: String,
    pub fields: Vec<String>,
    pub watermark: Option<WatermarkPredicate>,
}

impl QuerySpec {
    pub fn new(entity: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            entity: entity.into(),
            fields,
            watermark: None,
        }
    }

    /// Selects every catalog field; filters on the replication key only when
    /// the entity declares one.
    pub fn for_entity(
        schema: &EntitySchema,
        checkpoint: Option<&str>,
        end_date: Option<&str>,
    ) -> Self {
        let watermark = schema.replication_field().map(|field| WatermarkPredicate {
            field: field.name.clone(),
            field_type: field.field_type,
            after: checkpoint.map(str::to_string),
            before: end_date.map(str::to_string),
        });

        Self {
            entity: schema.name.clone(),
            fields: schema.field_names(),
            watermark,
        }
    }

    pub fn to_soql(&self) -> String {
        let mut soql = format!("SELECT {} FROM {}", self.fields.join(","), self.entity);

        if let Some(wm) = &self.watermark {
            let mut conditions = Vec::new();
            if let Some(after) = &wm.after {
                conditions.push(format!(
                    "{} > {}",
                    wm.field,
                    soql_literal(after, wm.field_type)
                ));
            }
            if let Some(before) = &wm.before {
                conditions.push(format!(
                    "{} < {}",
                    wm.field,
                    soql_literal(before, wm.field_type)
                ));
            }
            if !conditions.is_empty() {
                soql.push_str(" WHERE ");
                soql.push_str(&conditions.join(" AND "));
            }
            soql.push_str(&format!(" ORDER BY {} ASC", wm.field));
        }

        soql
    }
}
