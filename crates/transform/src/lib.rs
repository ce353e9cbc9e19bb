//! Row transformation pipeline.
//!
//! Every record written to a sink goes through the same steps:
//!
//! ```text
//! Row ──► column filter ──► field renaming ──► coercion + encoding ──► bytes
//!         (include/exclude)  (FieldNameFormat)  (SerializationFormat)
//! ```
//!
//! Coercion is part of encoding: the renamed [`Row`] still holds the source
//! values, and [`SerializationFormat::encode`] widens narrow integers, decodes
//! bytes and renders temporal values while writing.

pub mod coerce;
pub mod error;
pub mod format;
pub mod naming;

use std::collections::HashSet;

use sync_core::Row;

pub use coerce::{render_temporal, render_text, Coerced, CoercedRow};
pub use error::{Result, TransformError};
pub use format::SerializationFormat;
pub use naming::FieldNameFormat;

/// Column selection for a rule.
///
/// When the include set is non-empty only included columns are kept and the
/// exclude set is ignored. Otherwise excluded columns are dropped.
#[derive(Debug, Clone, Default)]
pub struct ColumnFilter {
    include: Vec<String>,
    include_set: HashSet<String>,
    exclude_set: HashSet<String>,
}

impl ColumnFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include_set: include.iter().cloned().collect(),
            include,
            exclude_set: exclude.into_iter().collect(),
        }
    }

    pub fn keeps(&self, column: &str) -> bool {
        if !self.include_set.is_empty() {
            self.include_set.contains(column)
        } else if !self.exclude_set.is_empty() {
            !self.exclude_set.contains(column)
        } else {
            true
        }
    }

    /// The include column, when exactly one is configured.
    pub fn single_include(&self) -> Option<&str> {
        match self.include.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }
}

/// Per-rule transformation settings.
#[derive(Debug, Clone, Default)]
pub struct RecordTransform {
    pub filter: ColumnFilter,
    pub naming: FieldNameFormat,
    pub format: SerializationFormat,
}

impl RecordTransform {
    pub fn new(filter: ColumnFilter, naming: FieldNameFormat, format: SerializationFormat) -> Self {
        Self {
            filter,
            naming,
            format,
        }
    }

    /// Filter and rename the columns of a row image.
    pub fn project(&self, row: &Row) -> Row {
        row.iter()
            .filter(|(column, _)| self.filter.keeps(column))
            .map(|(column, value)| (self.naming.convert(column), value.clone()))
            .collect()
    }

    /// Project a row image and encode it with the configured format.
    pub fn encode(&self, row: &Row) -> Result<Vec<u8>> {
        self.format.encode(&self.project(row))
    }

    /// Project a row image and encode it as JSON regardless of the configured format.
    pub fn encode_json(&self, row: &Row) -> Result<Vec<u8>> {
        SerializationFormat::Json.encode(&self.project(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::CellValue;

    fn user_row() -> Row {
        let mut row = Row::new();
        row.insert("id".into(), CellValue::Int64(1));
        row.insert("name".into(), CellValue::text("ann"));
        row.insert("email".into(), CellValue::text("ann@example.com"));
        row
    }

    fn keys(row: &Row) -> Vec<&str> {
        row.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_include_set_keeps_only_included() {
        let transform = RecordTransform::new(
            ColumnFilter::new(vec!["id".into(), "name".into()], vec![]),
            FieldNameFormat::UpperCamelCase,
            SerializationFormat::Json,
        );
        assert_eq!(keys(&transform.project(&user_row())), vec!["Id", "Name"]);
    }

    #[test]
    fn test_exclude_set_drops_excluded() {
        let transform = RecordTransform::new(
            ColumnFilter::new(vec![], vec!["email".into()]),
            FieldNameFormat::AsIs,
            SerializationFormat::Json,
        );
        assert_eq!(keys(&transform.project(&user_row())), vec!["id", "name"]);
    }

    #[test]
    fn test_include_wins_over_exclude() {
        let filter = ColumnFilter::new(vec!["email".into()], vec!["email".into()]);
        assert!(filter.keeps("email"));
        assert!(!filter.keeps("id"));
    }

    #[test]
    fn test_no_filter_keeps_everything() {
        let transform = RecordTransform::default();
        assert_eq!(transform.project(&user_row()).len(), 3);
    }

    #[test]
    fn test_single_include() {
        assert_eq!(
            ColumnFilter::new(vec!["name".into()], vec![]).single_include(),
            Some("name")
        );
        assert_eq!(
            ColumnFilter::new(vec!["id".into(), "name".into()], vec![]).single_include(),
            None
        );
        assert_eq!(ColumnFilter::default().single_include(), None);
    }

    #[test]
    fn test_encode_json_ignores_configured_format() {
        let transform = RecordTransform::new(
            ColumnFilter::default(),
            FieldNameFormat::LowerCamelCase,
            SerializationFormat::Yaml,
        );
        let bytes = transform.encode_json(&user_row()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["name"], "ann");
    }
}
