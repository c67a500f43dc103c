//! Lenient date parsing for upstream records.
//!
//! The record store hands out dates in several textual forms. Every parser
//! here returns `None` rather than an error: an unreadable date is a data
//! quality problem, never a reason to drop a record.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Naive date-time layouts tried after RFC 3339, interpreted as UTC.
const NAIVE_LAYOUTS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parse a textual date-time.
///
/// Accepts RFC 3339 (`2024-03-01T10:00:00Z`), naive date-times read as UTC
/// and bare dates (`2024-01-01`, midnight UTC).
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse an epoch-milliseconds timestamp given as a JSON number or numeric string.
pub fn parse_epoch_millis(raw: &Value) -> Option<DateTime<Utc>> {
    let millis = match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };

    DateTime::from_timestamp_millis(millis)
}

/// Parse a JSON date value: strings go through [`parse_datetime`], numbers
/// are read as epoch milliseconds.
pub fn parse_date_value(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(s) => parse_datetime(s).or_else(|| parse_epoch_millis(raw)),
        Value::Number(_) => parse_epoch_millis(raw),
        _ => None,
    }
}
