//! MySQL collaborators of the router.
//!
//! - [`Catalog`] lists tables and reads them page by page for backfill.
//! - [`ReplicationSource`] streams decoded row changes from the binlog to a
//!   [`RowEventHandler`], starting at a [`BinlogPosition`].
//!
//! Both have `mysql_async` implementations ([`MySqlCatalog`],
//! [`BinlogSource`]) and the catalog has an in-memory one for tests.

mod catalog;
mod memory;
mod options;
mod position;
mod replication;
mod schema;
mod value;

pub use catalog::{Catalog, MySqlCatalog, SYSTEM_SCHEMAS};
pub use memory::MemoryCatalog;
pub use options::MySqlOptions;
pub use position::BinlogPosition;
pub use replication::{BinlogSource, ReplicationSource, RowEventHandler};
pub use schema::{SchemaCache, TableSchema};
pub use value::{cell_from_binlog, cell_from_value};
