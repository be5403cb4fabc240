use super::rows::Row;
use crate::catalog::{EntitySchema, FieldType};
use serde_json::{Map, Number, Value};

/// A row shaped to its entity schema: every declared field present, typed.
pub type Record = Map<String, Value>;

/// Empty string is null; otherwise integer, then float, then null. Never fails.
pub fn coerce_numeric(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }

    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(u) = trimmed.parse::<u64>() {
        return Value::from(u);
    }
    match trimmed.parse::<f64>() {
        Ok(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        Err(_) => Value::Null,
    }
}

pub fn coerce_value(field_type: FieldType, value: Value) -> Value {
    match (field_type, value) {
        (_, Value::Null) => Value::Null,

        (FieldType::Integer | FieldType::Number, Value::String(s)) => coerce_numeric(&s),
        (FieldType::Integer | FieldType::Number, Value::Number(n)) => Value::Number(n),
        (FieldType::Integer | FieldType::Number, _) => Value::Null,

        (FieldType::Boolean, Value::String(s)) => {
            if s.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if s.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                Value::Null
            }
        }
        (FieldType::Boolean, Value::Bool(b)) => Value::Bool(b),
        (FieldType::Boolean, _) => Value::Null,

        (FieldType::Date | FieldType::Datetime, Value::String(s)) if s.is_empty() => Value::Null,

        (FieldType::Object, Value::String(s)) if s.is_empty() => Value::Null,
        (FieldType::Object, Value::String(s)) => match serde_json::from_str::<Value>(&s) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => parsed,
            _ => Value::String(s),
        },

        (_, other) => other,
    }
}

/// Projects a raw row onto the schema. Undeclared columns are dropped and
/// missing ones come out as null.
pub fn shape_record(schema: &EntitySchema, mut row: Row) -> Record {
    schema
        .fields
        .iter()
        .map(|field| {
            let raw = row.remove(&field.name).unwrap_or(Value::Null);
            (field.name.clone(), coerce_value(field.field_type, raw))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldDef;
    use serde_json::json;

    #[test]
    fn test_numeric_empty_is_null() {
        assert_eq!(coerce_numeric(""), Value::Null);
    }

    #[test]
    fn test_numeric_integer() {
        assert_eq!(coerce_numeric("42"), json!(42));
        assert!(coerce_numeric("42").is_i64());
        assert_eq!(coerce_numeric("-7"), json!(-7));
    }

    #[test]
    fn test_numeric_float() {
        let expected: f64 = "3.14".parse().unwrap();
        assert_eq!(coerce_numeric("3.14"), json!(expected));
        assert!(coerce_numeric("3.14").is_f64());
        assert_eq!(coerce_numeric("1e3"), json!(1000.0));
    }

    #[test]
    fn test_numeric_garbage_is_null() {
        assert_eq!(coerce_numeric("abc"), Value::Null);
        assert_eq!(coerce_numeric("12abc"), Value::Null);
        assert_eq!(coerce_numeric("   "), Value::Null);
    }

    #[test]
    fn test_numeric_non_finite_is_null() {
        assert_eq!(coerce_numeric("NaN"), Value::Null);
        assert_eq!(coerce_numeric("inf"), Value::Null);
    }

    #[test]
    fn test_numeric_large_unsigned() {
        assert_eq!(coerce_numeric("18446744073709551615"), json!(u64::MAX));
    }

    #[test]
    fn test_booleans() {
        assert_eq!(
            coerce_value(FieldType::Boolean, json!("true")),
            json!(true)
        );
        assert_eq!(
            coerce_value(FieldType::Boolean, json!("FALSE")),
            json!(false)
        );
        assert_eq!(coerce_value(FieldType::Boolean, json!("")), Value::Null);
        assert_eq!(coerce_value(FieldType::Boolean, json!(true)), json!(true));
    }

    #[test]
    fn test_object_parses_json_text() {
        assert_eq!(
            coerce_value(FieldType::Object, json!("{\"city\":\"Paris\"}")),
            json!({"city": "Paris"})
        );
        assert_eq!(
            coerce_value(FieldType::Object, json!("not json")),
            json!("not json")
        );
    }

    #[test]
    fn test_strings_pass_through() {
        assert_eq!(coerce_value(FieldType::String, json!("")), json!(""));
        assert_eq!(coerce_value(FieldType::String, json!("42")), json!("42"));
    }

    #[test]
    fn test_shape_record_fills_missing_and_drops_extra() {
        let schema = EntitySchema::new(
            "Account",
            vec![
                FieldDef::new("Id", FieldType::String),
                FieldDef::new("AnnualRevenue", FieldType::Number),
                FieldDef::new("NumberOfEmployees", FieldType::Integer),
                FieldDef::new("LastModifiedDate", FieldType::Datetime),
            ],
        );
        let mut row = Row::new();
        row.insert("Id".to_string(), json!("001"));
        row.insert("AnnualRevenue".to_string(), json!(""));
        row.insert("NumberOfEmployees".to_string(), json!("250"));
        row.insert("attributes".to_string(), json!({"type": "Account"}));

        let record = shape_record(&schema, row);

        assert_eq!(record.len(), 4);
        assert_eq!(record["Id"], json!("001"));
        assert_eq!(record["AnnualRevenue"], Value::Null);
        assert_eq!(record["NumberOfEmployees"], json!(250));
        assert_eq!(record["LastModifiedDate"], Value::Null);
        assert!(!record.contains_key("attributes"));
    }
}
