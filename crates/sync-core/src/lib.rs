//! Core types for the binlog-fanout router.
//!
//! This crate provides the foundational types shared by every other crate in
//! the workspace:
//!
//! - [`CellValue`] - a single decoded column value as produced by the source
//! - [`Temporal`] - raw calendar/clock components of a MySQL temporal value
//! - [`Row`] - a column name to value image of one table row
//! - [`RowChange`] - a decoded row change as delivered by the replication engine
//! - [`EventData`] - the per-rule change event handed to sink consumers
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── transform      (filters, renames and encodes rows)
//!    ├─── fanout-sink    (consumer contract, batch policy, log sink)
//!    ├─── redis-sink     (key-value consumer)
//!    ├─── search-sink    (document index consumers)
//!    └─── mysql-source   (catalog and binlog collaborators)
//! ```
//!
//! # Example
//!
//! ```rust
//! use sync_core::{CellValue, EventData, Row, TableRef};
//!
//! let mut after = Row::new();
//! after.insert("id".to_string(), CellValue::Int64(5));
//! after.insert("name".to_string(), CellValue::text("alice"));
//!
//! let event = EventData::insert(TableRef::new("shop", "users"), vec!["id".into()], after);
//! assert!(event.before().is_none());
//! assert_eq!(event.after().unwrap().len(), 2);
//! ```

pub mod event;
pub mod values;

pub use event::{Action, EventData, RowChange, TableRef};
pub use values::{CellValue, Row, Temporal};
