use sync_core::{EventData, Row};
use transform::render_text;

/// Resolves the id a record is stored under.
///
/// The configured custom column wins; otherwise the first primary-key column
/// of the source table is used.
#[derive(Debug, Clone, Default)]
pub struct KeyResolver {
    custom_pk: Option<String>,
}

impl KeyResolver {
    /// An empty column name means "no override".
    pub fn new(custom_pk: impl Into<String>) -> Self {
        let custom_pk = custom_pk.into();
        Self {
            custom_pk: (!custom_pk.is_empty()).then_some(custom_pk),
        }
    }

    pub fn key_column<'a>(&'a self, event: &'a EventData) -> Option<&'a str> {
        self.custom_pk
            .as_deref()
            .or_else(|| event.pk_columns.first().map(String::as_str))
    }

    /// Id of `image`, rendered as text.
    ///
    /// Returns an empty string when no key column can be determined; the
    /// caller decides whether to skip such records.
    pub fn resolve(&self, event: &EventData, image: &Row) -> String {
        let Some(column) = self.key_column(event) else {
            tracing::error!(
                table = %event.table,
                "No primary key column and no custom PK column configured"
            );
            return String::new();
        };
        match image.get(column) {
            Some(value) => render_text(value),
            None => {
                tracing::warn!(table = %event.table, column, "Key column missing from row image");
                String::new()
            }
        }
    }
}
