//! Type coercion applied when a record is serialized.
//!
//! Narrow integers widen to 32 bits, raw bytes decode as text and temporal
//! values render as one of three canonical strings.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use sync_core::{CellValue, Row, Temporal};

/// Render a temporal value.
///
/// - zero time of day → `YYYY-MM-DD`
/// - zero calendar date → `HH:MM:SS`
/// - anything else → RFC 3339 `YYYY-MM-DDTHH:MM:SSZ`
///
/// The time-of-day check runs first, so an exact-midnight timestamp renders
/// as a date.
pub fn render_temporal(t: &Temporal) -> String {
    if t.has_zero_time() {
        format!("{:04}-{:02}-{:02}", t.year, t.month, t.day)
    } else if t.has_zero_date() {
        format!("{:02}:{:02}:{:02}", t.hour, t.minute, t.second)
    } else {
        let date = NaiveDate::from_ymd_opt(t.year as i32, t.month as u32, t.day as u32);
        let time = NaiveTime::from_hms_opt(t.hour as u32, t.minute as u32, t.second as u32);
        match (date, time) {
            (Some(date), Some(time)) => Utc
                .from_utc_datetime(&NaiveDateTime::new(date, time))
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            // Partially-zero dates have no calendar equivalent
            _ => format!(
                "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
                t.year, t.month, t.day, t.hour, t.minute, t.second
            ),
        }
    }
}

/// Render a value as plain text, used for record ids and single-column values.
///
/// NULL renders as the empty string.
pub fn render_text(value: &CellValue) -> String {
    match value {
        CellValue::Null => String::new(),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Int8(i) => i.to_string(),
        CellValue::Int16(i) => i.to_string(),
        CellValue::Int32(i) => i.to_string(),
        CellValue::Int64(i) => i.to_string(),
        CellValue::UInt64(u) => u.to_string(),
        CellValue::Float32(f) => f.to_string(),
        CellValue::Float64(f) => f.to_string(),
        CellValue::Decimal(s) | CellValue::Text(s) => s.clone(),
        CellValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        CellValue::Temporal(t) => render_temporal(t),
        CellValue::Json(v) => v.to_string(),
    }
}

/// Serializes a [`CellValue`] with coercion applied.
pub struct Coerced<'a>(pub &'a CellValue);

impl Serialize for Coerced<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::Int8(i) => serializer.serialize_i32(*i as i32),
            CellValue::Int16(i) => serializer.serialize_i32(*i as i32),
            CellValue::Int32(i) => serializer.serialize_i32(*i),
            CellValue::Int64(i) => serializer.serialize_i64(*i),
            CellValue::UInt64(u) => serializer.serialize_u64(*u),
            CellValue::Float32(f) => serializer.serialize_f32(*f),
            CellValue::Float64(f) => serializer.serialize_f64(*f),
            CellValue::Decimal(s) | CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Bytes(b) => serializer.serialize_str(&String::from_utf8_lossy(b)),
            CellValue::Temporal(t) => serializer.serialize_str(&render_temporal(t)),
            CellValue::Json(v) => v.serialize(serializer),
        }
    }
}

/// Serializes a whole [`Row`] as a map with coercion applied to every value.
pub struct CoercedRow<'a>(pub &'a Row);

impl Serialize for CoercedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in self.0 {
            map.serialize_entry(column, &Coerced(value))?;
        }
        map.end()
    }
}
