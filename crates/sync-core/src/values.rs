//! Value representations for decoded column data.
//!
//! Values arrive from two places: the binlog stream (live changes) and the
//! catalog (backfill pages). Both are decoded into [`CellValue`] so the rest of
//! the pipeline never sees a driver type.

use std::collections::BTreeMap;

/// A row image: column name to value.
///
/// Ordered by column name so that every encoding of a row is deterministic.
pub type Row = BTreeMap<String, CellValue>;

/// A single decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// SQL NULL
    Null,

    /// Boolean value
    Bool(bool),

    /// 8-bit signed integer (TINYINT)
    Int8(i8),

    /// 16-bit signed integer (SMALLINT)
    Int16(i16),

    /// 32-bit signed integer
    Int32(i32),

    /// 64-bit signed integer
    Int64(i64),

    /// 64-bit unsigned integer (BIGINT UNSIGNED)
    UInt64(u64),

    /// 32-bit IEEE 754 floating point
    Float32(f32),

    /// 64-bit IEEE 754 floating point
    Float64(f64),

    /// Exact decimal kept in its textual form
    Decimal(String),

    /// Character data
    Text(String),

    /// Raw bytes as returned by the driver (VARCHAR, BLOB, DECIMAL in text form...)
    Bytes(Vec<u8>),

    /// DATE, TIME, DATETIME or TIMESTAMP
    Temporal(Temporal),

    /// JSON document
    Json(serde_json::Value),
}

impl CellValue {
    /// Create a text value.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Raw components of a temporal value.
///
/// MySQL allows zero dates (`0000-00-00`) and TIME values carry no date at
/// all, so the components are kept as-is instead of being forced into a
/// calendar type. A TIME value is represented with a zero date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Temporal {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub micros: u32,
}

impl Temporal {
    /// A calendar date with a zero time of day.
    pub fn date(year: u16, month: u8, day: u8) -> Self {
        Self {
            year,
            month,
            day,
            ..Default::default()
        }
    }

    /// A time of day with a zero calendar date.
    pub fn time(hour: u8, minute: u8, second: u8) -> Self {
        Self {
            hour,
            minute,
            second,
            ..Default::default()
        }
    }

    /// A full date and time.
    pub fn datetime(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            micros: 0,
        }
    }

    /// True when hour, minute and second are all zero.
    pub fn has_zero_time(&self) -> bool {
        self.hour == 0 && self.minute == 0 && self.second == 0
    }

    /// True when year, month and day are all zero.
    pub fn has_zero_date(&self) -> bool {
        self.year == 0 && self.month == 0 && self.day == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporal_zero_checks() {
        let date = Temporal::date(2024, 7, 3);
        assert!(date.has_zero_time());
        assert!(!date.has_zero_date());

        let time = Temporal::time(10, 20, 30);
        assert!(time.has_zero_date());
        assert!(!time.has_zero_time());

        let both = Temporal::datetime(2024, 7, 3, 10, 20, 30);
        assert!(!both.has_zero_date());
        assert!(!both.has_zero_time());
    }

    #[test]
    fn test_row_is_ordered_by_column() {
        let mut row = Row::new();
        row.insert("name".into(), CellValue::text("bob"));
        row.insert("email".into(), CellValue::Null);
        row.insert("id".into(), CellValue::Int64(1));

        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["email", "id", "name"]);
    }
}
