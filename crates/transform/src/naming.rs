//! Field name conventions.

use serde::{Deserialize, Serialize};

/// How column names are rewritten before a record is encoded.
///
/// Configured by name; any name other than `lowerCamelCase` or
/// `upperCamelCase` leaves column names untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldNameFormat {
    /// Keep the column name as-is
    #[default]
    AsIs,
    /// `last_update_user` → `lastUpdateUser`
    LowerCamelCase,
    /// `last_update_user` → `LastUpdateUser`
    UpperCamelCase,
}

impl FieldNameFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldNameFormat::AsIs => "none",
            FieldNameFormat::LowerCamelCase => "lowerCamelCase",
            FieldNameFormat::UpperCamelCase => "upperCamelCase",
        }
    }

    /// Rewrite one column name.
    pub fn convert(&self, column: &str) -> String {
        match self {
            FieldNameFormat::AsIs => column.to_string(),
            FieldNameFormat::LowerCamelCase => lower_camel_case(column),
            FieldNameFormat::UpperCamelCase => upper_camel_case(column),
        }
    }
}

impl From<String> for FieldNameFormat {
    fn from(name: String) -> Self {
        match name.as_str() {
            "lowerCamelCase" => FieldNameFormat::LowerCamelCase,
            "upperCamelCase" => FieldNameFormat::UpperCamelCase,
            _ => FieldNameFormat::AsIs,
        }
    }
}

impl From<FieldNameFormat> for String {
    fn from(format: FieldNameFormat) -> Self {
        format.as_str().to_string()
    }
}

/// Split on `_`; fall back to `-` when underscores give a single segment.
fn segments(input: &str) -> Vec<&str> {
    let parts: Vec<&str> = input.split('_').collect();
    if parts.len() > 1 {
        return parts;
    }
    input.split('-').collect()
}

/// First character upper case, the rest lower case.
fn title_case(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn lower_camel_case(input: &str) -> String {
    segments(input)
        .into_iter()
        .enumerate()
        .map(|(i, part)| {
            if i == 0 {
                part.to_lowercase()
            } else {
                title_case(part)
            }
        })
        .collect()
}

fn upper_camel_case(input: &str) -> String {
    segments(input).into_iter().map(title_case).collect()
}
