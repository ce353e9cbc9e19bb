//! `mysql_async` values to [`CellValue`].

use mysql_async::binlog::value::BinlogValue;
use mysql_async::consts::ColumnType;
use mysql_async::Value;
use sync_core::{CellValue, Temporal};

/// Convert a value read over the binary protocol or from a binlog row.
///
/// The column type, when known, narrows integers and identifies decimal
/// and JSON columns. Integers that do not fit the narrow type (unsigned
/// columns) are kept as 64-bit values.
pub fn cell_from_value(value: Value, column_type: Option<ColumnType>) -> CellValue {
    use ColumnType::*;

    match value {
        Value::NULL => CellValue::Null,
        Value::Int(i) => match column_type {
            Some(MYSQL_TYPE_TINY) => i8::try_from(i)
                .map(CellValue::Int8)
                .unwrap_or(CellValue::Int64(i)),
            Some(MYSQL_TYPE_SHORT) | Some(MYSQL_TYPE_YEAR) => i16::try_from(i)
                .map(CellValue::Int16)
                .unwrap_or(CellValue::Int64(i)),
            Some(MYSQL_TYPE_LONG) | Some(MYSQL_TYPE_INT24) => i32::try_from(i)
                .map(CellValue::Int32)
                .unwrap_or(CellValue::Int64(i)),
            _ => CellValue::Int64(i),
        },
        Value::UInt(u) => CellValue::UInt64(u),
        Value::Float(f) => CellValue::Float32(f),
        Value::Double(d) => CellValue::Float64(d),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            CellValue::Temporal(Temporal {
                year,
                month,
                day,
                hour,
                minute,
                second,
                micros,
            })
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            if !negative && days == 0 {
                CellValue::Temporal(Temporal {
                    hour: hours,
                    minute: minutes,
                    second: seconds,
                    micros,
                    ..Default::default()
                })
            } else {
                // Outside a single day; no calendar representation
                let total_hours = days * 24 + u32::from(hours);
                let sign = if negative { "-" } else { "" };
                CellValue::Text(format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}"))
            }
        }
        Value::Bytes(bytes) => match column_type {
            Some(MYSQL_TYPE_DECIMAL) | Some(MYSQL_TYPE_NEWDECIMAL) => {
                CellValue::Decimal(String::from_utf8_lossy(&bytes).into_owned())
            }
            Some(MYSQL_TYPE_JSON) => match serde_json::from_slice(&bytes) {
                Ok(json) => CellValue::Json(json),
                Err(_) => text_or_bytes(bytes),
            },
            Some(MYSQL_TYPE_BIT) | Some(MYSQL_TYPE_GEOMETRY) => CellValue::Bytes(bytes),
            _ => text_or_bytes(bytes),
        },
    }
}

fn text_or_bytes(bytes: Vec<u8>) -> CellValue {
    match String::from_utf8(bytes) {
        Ok(text) => CellValue::Text(text),
        Err(e) => CellValue::Bytes(e.into_bytes()),
    }
}

/// Convert one value of a binlog row.
pub fn cell_from_binlog(value: BinlogValue<'static>, column_type: Option<ColumnType>) -> CellValue {
    match value {
        BinlogValue::Value(value) => cell_from_value(value, column_type),
        BinlogValue::Jsonb(jsonb) => match serde_json::Value::try_from(jsonb) {
            Ok(json) => CellValue::Json(json),
            Err(e) => {
                tracing::warn!("Failed to decode binary JSON value: {e}");
                CellValue::Null
            }
        },
        BinlogValue::JsonDiff(_) => {
            tracing::warn!("Partial JSON update without full image; column left empty");
            CellValue::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integers_narrow_by_column_type() {
        assert_eq!(
            cell_from_value(Value::Int(7), Some(ColumnType::MYSQL_TYPE_TINY)),
            CellValue::Int8(7)
        );
        assert_eq!(
            cell_from_value(Value::Int(300), Some(ColumnType::MYSQL_TYPE_SHORT)),
            CellValue::Int16(300)
        );
        assert_eq!(
            cell_from_value(Value::Int(70_000), Some(ColumnType::MYSQL_TYPE_LONG)),
            CellValue::Int32(70_000)
        );
        assert_eq!(cell_from_value(Value::Int(7), None), CellValue::Int64(7));
    }

    #[test]
    fn test_unsigned_tiny_out_of_range_stays_wide() {
        assert_eq!(
            cell_from_value(Value::Int(200), Some(ColumnType::MYSQL_TYPE_TINY)),
            CellValue::Int64(200)
        );
    }

    #[test]
    fn test_temporal_values() {
        assert_eq!(
            cell_from_value(Value::Date(2024, 7, 3, 0, 0, 0, 0), None),
            CellValue::Temporal(Temporal::date(2024, 7, 3))
        );
        assert_eq!(
            cell_from_value(Value::Time(false, 0, 9, 5, 7, 0), None),
            CellValue::Temporal(Temporal::time(9, 5, 7))
        );
        assert_eq!(
            cell_from_value(Value::Time(true, 1, 2, 3, 4, 0), None),
            CellValue::Text("-26:03:04".into())
        );
    }

    #[test]
    fn test_bytes_by_column_type() {
        assert_eq!(
            cell_from_value(
                Value::Bytes(b"12.50".to_vec()),
                Some(ColumnType::MYSQL_TYPE_NEWDECIMAL)
            ),
            CellValue::Decimal("12.50".into())
        );
        assert_eq!(
            cell_from_value(
                Value::Bytes(br#"{"a":1}"#.to_vec()),
                Some(ColumnType::MYSQL_TYPE_JSON)
            ),
            CellValue::Json(json!({"a": 1}))
        );
        assert_eq!(
            cell_from_value(Value::Bytes(b"ann".to_vec()), Some(ColumnType::MYSQL_TYPE_VAR_STRING)),
            CellValue::Text("ann".into())
        );
        assert_eq!(
            cell_from_value(Value::Bytes(vec![0xff, 0x00]), None),
            CellValue::Bytes(vec![0xff, 0x00])
        );
    }

    #[test]
    fn test_binlog_plain_value() {
        assert_eq!(
            cell_from_binlog(BinlogValue::Value(Value::NULL), None),
            CellValue::Null
        );
    }
}
