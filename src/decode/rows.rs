use crate::error::Result;
use serde_json::{Map, Value};

/// One result row keyed by column name, values still untyped.
pub type Row = Map<String, Value>;

/// Lazily splits a CSV result page into rows, in file order.
///
/// Quoted fields may contain the delimiter and line breaks. An empty
/// payload yields no rows.
pub struct CsvRows<'a> {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<&'a [u8]>,
}

pub fn decode_rows(payload: &str) -> Result<CsvRows<'_>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(payload.as_bytes());

    let headers = reader.headers()?.iter().map(str::to_string).collect();

    Ok(CsvRows {
        headers,
        records: reader.into_records(),
    })
}

impl CsvRows<'_> {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Iterator for CsvRows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };

        let row = self
            .headers
            .iter()
            .zip(record.iter())
            .map(|(name, value)| (name.clone(), Value::String(value.to_string())))
            .collect();
        Some(Ok(row))
    }
}
