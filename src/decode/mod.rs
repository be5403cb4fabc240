mod coerce;
mod rows;

pub use coerce::{coerce_numeric, coerce_value, shape_record, Record};
pub use rows::{decode_rows, CsvRows, Row};
