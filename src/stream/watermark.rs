use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::cmp::Ordering;

const OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses the timestamp shapes the API and users hand us: RFC 3339,
/// `+0000` offsets, naive datetimes (taken as UTC) and bare dates.
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, OFFSET_FORMAT) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Orders replication-key values: as instants when both parse, as numbers
/// when both parse, otherwise lexicographically.
pub fn compare_watermarks(a: &str, b: &str) -> Ordering {
    if let (Some(x), Some(y)) = (parse_instant(a), parse_instant(b)) {
        return x.cmp(&y);
    }
    if let (Ok(x), Ok(y)) = (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        if let Some(ord) = x.partial_cmp(&y) {
            return ord;
        }
    }
    a.cmp(b)
}

/// Returns the value to persist: `observed` only when it is strictly ahead
/// of `current`.
pub fn advance_checkpoint(current: Option<&str>, observed: Option<&str>) -> Option<String> {
    match (current, observed) {
        (_, None) => current.map(str::to_string),
        (None, Some(o)) => Some(o.to_string()),
        (Some(c), Some(o)) => match compare_watermarks(o, c) {
            Ordering::Greater => Some(o.to_string()),
            _ => Some(c.to_string()),
        },
    }
}

/// Running maximum of the replication-key values seen in one run.
#[derive(Debug, Default, Clone)]
pub struct WatermarkTracker {
    max: Option<String>,
    observed: u64,
}

impl WatermarkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        self.observed += 1;
        match &self.max {
            Some(current) if compare_watermarks(value, current) != Ordering::Greater => {}
            _ => self.max = Some(value.to_string()),
        }
    }

    pub fn max(&self) -> Option<&str> {
        self.max.as_deref()
    }

    pub fn observed(&self) -> u64 {
        self.observed
    }
}
