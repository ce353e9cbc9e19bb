//! Change events.
//!
//! [`RowChange`] is what the replication engine decodes from the binlog: column
//! order, primary-key indices and positional row tuples. [`EventData`] is the
//! per-rule event built from it, with named row images.

use std::fmt;
use std::sync::Arc;

use crate::values::{CellValue, Row};

/// Row change kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Insert,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Insert => "insert",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    /// Whether events of this kind remove a previous record (delete, update).
    pub fn removes(&self) -> bool {
        matches!(self, Action::Update | Action::Delete)
    }

    /// Whether events of this kind write a new record (insert, update).
    pub fn writes(&self) -> bool {
        matches!(self, Action::Insert | Action::Update)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully-qualified table identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// The `schema.table` form that rule patterns are matched against.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// A decoded row change as handed over by the replication engine.
///
/// `columns` and `pk_indices` describe the table at the time of the change
/// and are shared between every change of the same table.
#[derive(Debug, Clone)]
pub struct RowChange {
    pub action: Action,
    pub table: TableRef,
    pub columns: Arc<[String]>,
    pub pk_indices: Arc<[usize]>,
    /// Row tuple before the change (update, delete)
    pub before: Option<Vec<CellValue>>,
    /// Row tuple after the change (insert, update)
    pub after: Option<Vec<CellValue>>,
}

impl RowChange {
    /// Primary-key column names in key order. Indices outside the column list are ignored.
    pub fn pk_columns(&self) -> Vec<String> {
        self.pk_indices
            .iter()
            .filter_map(|&idx| self.columns.get(idx).cloned())
            .collect()
    }

    /// Name the values of a row tuple by column order.
    ///
    /// A tuple shorter than the column list yields only the leading columns;
    /// extra values without a column are dropped.
    pub fn image(&self, values: &[CellValue]) -> Row {
        self.columns
            .iter()
            .zip(values.iter())
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect()
    }
}

/// A change event delivered to one rule's consumer.
///
/// The image invariant (update carries both images, insert only `after`,
/// delete only `before`) is guaranteed by the constructors.
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    pub action: Action,
    pub table: TableRef,
    /// Primary-key column names from the source schema; empty when the table has none
    pub pk_columns: Vec<String>,
    before: Option<Row>,
    after: Option<Row>,
}

impl EventData {
    pub fn insert(table: TableRef, pk_columns: Vec<String>, after: Row) -> Self {
        Self {
            action: Action::Insert,
            table,
            pk_columns,
            before: None,
            after: Some(after),
        }
    }

    pub fn update(table: TableRef, pk_columns: Vec<String>, before: Row, after: Row) -> Self {
        Self {
            action: Action::Update,
            table,
            pk_columns,
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn delete(table: TableRef, pk_columns: Vec<String>, before: Row) -> Self {
        Self {
            action: Action::Delete,
            table,
            pk_columns,
            before: Some(before),
            after: None,
        }
    }

    pub fn before(&self) -> Option<&Row> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&Row> {
        self.after.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_change(action: Action) -> RowChange {
        RowChange {
            action,
            table: TableRef::new("shop", "users"),
            columns: vec!["id".to_string(), "name".to_string(), "email".to_string()].into(),
            pk_indices: vec![0].into(),
            before: None,
            after: None,
        }
    }

    #[test]
    fn test_table_ref_qualified() {
        let table = TableRef::new("shop", "orders");
        assert_eq!(table.qualified(), "shop.orders");
        assert_eq!(table.to_string(), "shop.orders");
        assert_eq!(Action::Update.to_string(), "update");
    }

    #[test]
    fn test_row_change_pk_columns() {
        let mut change = users_change(Action::Insert);
        assert_eq!(change.pk_columns(), vec!["id".to_string()]);

        change.pk_indices = vec![2, 0, 9].into();
        assert_eq!(
            change.pk_columns(),
            vec!["email".to_string(), "id".to_string()]
        );
    }

    #[test]
    fn test_row_change_image_short_tuple() {
        let change = users_change(Action::Insert);
        let image = change.image(&[CellValue::Int64(1), CellValue::text("ann")]);
        assert_eq!(image.len(), 2);
        assert_eq!(image.get("id"), Some(&CellValue::Int64(1)));
        assert!(!image.contains_key("email"));
    }

    #[test]
    fn test_event_images_follow_action() {
        let table = TableRef::new("shop", "users");
        let insert = EventData::insert(table.clone(), vec![], Row::new());
        assert!(insert.before().is_none() && insert.after().is_some());

        let update = EventData::update(table.clone(), vec![], Row::new(), Row::new());
        assert!(update.before().is_some() && update.after().is_some());

        let delete = EventData::delete(table, vec![], Row::new());
        assert!(delete.before().is_some() && delete.after().is_none());
    }

    #[test]
    fn test_action_classification() {
        assert!(Action::Delete.removes() && !Action::Delete.writes());
        assert!(Action::Update.removes() && Action::Update.writes());
        assert!(!Action::Insert.removes() && Action::Insert.writes());
        assert_eq!(Action::Update.to_string(), "update");
    }
}
