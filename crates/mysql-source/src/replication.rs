//! Binlog replication.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use mysql_async::binlog::events::EventData;
use mysql_async::consts::ColumnType;
use mysql_async::{BinlogStreamRequest, Conn};
use sync_core::{Action, RowChange, TableRef};

use crate::catalog::MySqlCatalog;
use crate::options::MySqlOptions;
use crate::position::BinlogPosition;
use crate::schema::SchemaCache;
use crate::value::cell_from_binlog;

/// Receives every decoded row change, in binlog order.
#[async_trait::async_trait]
pub trait RowEventHandler: Send + Sync {
    /// Whether changes of `table` should be decoded and delivered at all.
    fn wants(&self, _table: &TableRef) -> bool {
        true
    }

    /// Handle one row change. An error stops replication.
    async fn on_row(&self, change: RowChange) -> Result<()>;
}

/// A replication stream that can report its current position and replay
/// from a given one.
#[async_trait::async_trait]
pub trait ReplicationSource: Send + Sync {
    /// The position a stream started now would begin at.
    async fn current_position(&self) -> Result<BinlogPosition>;

    /// Stream changes from `position` until the handler fails or the
    /// source gives up reconnecting.
    async fn run_from(&self, position: BinlogPosition, handler: &dyn RowEventHandler) -> Result<()>;
}

enum StreamFailure {
    /// Connection or decoding problem; worth reconnecting
    Source(anyhow::Error),
    Handler(anyhow::Error),
}

fn source_failure(err: impl Into<anyhow::Error>) -> StreamFailure {
    StreamFailure::Source(err.into())
}

fn is_ddl(query: &str) -> bool {
    let head = query
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(head.as_str(), "ALTER" | "CREATE" | "DROP" | "RENAME" | "TRUNCATE")
}

fn rotated_position(file: String, offset: u64) -> Result<BinlogPosition> {
    let offset = u32::try_from(offset)
        .with_context(|| format!("Rotate event offset {offset} in {file} does not fit a binlog position"))?;
    Ok(BinlogPosition::new(file, offset))
}

fn action_of(has_before: bool, has_after: bool) -> Option<Action> {
    match (has_before, has_after) {
        (false, true) => Some(Action::Insert),
        (true, true) => Some(Action::Update),
        (true, false) => Some(Action::Delete),
        (false, false) => None,
    }
}

/// [`ReplicationSource`] reading the MySQL binlog as a replica.
///
/// Requires `binlog_format=ROW` and `binlog_row_image=FULL`. Column names
/// and primary keys come from `INFORMATION_SCHEMA` and are cached until the
/// next DDL statement.
pub struct BinlogSource {
    options: MySqlOptions,
    catalog: MySqlCatalog,
    schemas: SchemaCache,
}

impl BinlogSource {
    pub fn new(options: MySqlOptions, catalog: MySqlCatalog) -> Self {
        let schemas = SchemaCache::new(catalog.pool().clone());
        Self {
            options,
            catalog,
            schemas,
        }
    }

    /// Stream until the connection drops. `position` tracks the last
    /// committed transaction so a reconnect resumes from there.
    async fn stream(
        &self,
        position: &mut BinlogPosition,
        handler: &dyn RowEventHandler,
        attempts: &mut u32,
    ) -> std::result::Result<(), StreamFailure> {
        let conn = Conn::new(self.options.opts())
            .await
            .map_err(source_failure)?;
        let request = BinlogStreamRequest::new(self.options.server_id)
            .with_filename(position.file.as_bytes())
            .with_pos(u64::from(position.position));
        let mut stream = conn
            .get_binlog_stream(request)
            .await
            .map_err(source_failure)?;
        tracing::info!("Streaming binlog from {position}");

        while let Some(event) = stream.next().await {
            let event = event.map_err(source_failure)?;
            *attempts = 0;
            let log_pos = event.header().log_pos();

            let mut changes = Vec::new();
            let mut committed = false;

            match event.read_data().map_err(source_failure)? {
                Some(EventData::RotateEvent(rotate)) => {
                    let next = rotated_position(rotate.name().into_owned(), rotate.position())
                        .map_err(source_failure)?;
                    tracing::debug!("Binlog rotated to {next}");
                    *position = next;
                    continue;
                }
                Some(EventData::XidEvent(_)) => committed = true,
                Some(EventData::QueryEvent(query)) => {
                    let sql = query.query();
                    if !sql.trim().eq_ignore_ascii_case("BEGIN") {
                        if is_ddl(&sql) {
                            tracing::info!(schema = %query.schema(), "DDL seen, dropping cached table schemas");
                            self.schemas.invalidate().await;
                        }
                        committed = true;
                    }
                }
                Some(EventData::RowsEvent(rows_event)) => {
                    let table_id = rows_event.table_id();
                    let Some(tme) = stream.get_tme(table_id) else {
                        tracing::warn!(table_id, "Rows event without table map, skipping");
                        continue;
                    };
                    let table = TableRef::new(
                        tme.database_name().into_owned(),
                        tme.table_name().into_owned(),
                    );
                    if !handler.wants(&table) {
                        continue;
                    }
                    let column_types: Vec<Option<ColumnType>> = (0..tme.columns_count() as usize)
                        .map(|i| tme.get_column_type(i).ok().flatten())
                        .collect();

                    let schema = self.schemas.get(&table).await.map_err(source_failure)?;
                    let Some(tme) = stream.get_tme(table_id) else {
                        continue;
                    };

                    for row in rows_event.rows(tme) {
                        let (before, after) = row.map_err(source_failure)?;
                        let Some(action) = action_of(before.is_some(), after.is_some()) else {
                            continue;
                        };
                        let decode = |row: mysql_async::binlog::row::BinlogRow| {
                            // BinlogRow::unwrap hands over the values, it never panics
                            row.unwrap()
                                .into_iter()
                                .enumerate()
                                .map(|(i, value)| {
                                    cell_from_binlog(value, column_types.get(i).copied().flatten())
                                })
                                .collect::<Vec<_>>()
                        };
                        changes.push(RowChange {
                            action,
                            table: table.clone(),
                            columns: schema.columns.clone(),
                            pk_indices: schema.pk_indices.clone(),
                            before: before.map(decode),
                            after: after.map(decode),
                        });
                    }
                }
                _ => {}
            }

            for change in changes {
                handler
                    .on_row(change)
                    .await
                    .map_err(StreamFailure::Handler)?;
            }
            if committed && log_pos > 0 {
                position.position = log_pos;
            }
        }
        Err(StreamFailure::Source(anyhow::anyhow!("Binlog stream ended")))
    }
}

#[async_trait::async_trait]
impl ReplicationSource for BinlogSource {
    async fn current_position(&self) -> Result<BinlogPosition> {
        self.catalog.master_position().await
    }

    async fn run_from(&self, position: BinlogPosition, handler: &dyn RowEventHandler) -> Result<()> {
        let mut position = position;
        let mut attempts = 0u32;
        loop {
            match self.stream(&mut position, handler, &mut attempts).await {
                Ok(()) => return Ok(()),
                Err(StreamFailure::Handler(e)) => return Err(e),
                Err(StreamFailure::Source(e)) => {
                    attempts += 1;
                    if attempts > self.options.max_reconnect_attempts {
                        return Err(e).with_context(|| {
                            format!("Binlog replication failed after {} reconnect attempts", attempts - 1)
                        });
                    }
                    tracing::warn!(
                        attempt = attempts,
                        "Binlog stream interrupted at {position}: {e:#}; reconnecting"
                    );
                    tokio::time::sleep(Duration::from_secs(u64::from(attempts))).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_detection() {
        assert!(is_ddl("ALTER TABLE users ADD COLUMN age INT"));
        assert!(is_ddl("  drop table t"));
        assert!(is_ddl("TRUNCATE shop.orders"));
        assert!(!is_ddl("BEGIN"));
        assert!(!is_ddl("INSERT INTO t VALUES (1)"));
        assert!(!is_ddl(""));
    }

    #[test]
    fn test_action_from_images() {
        assert_eq!(action_of(false, true), Some(Action::Insert));
        assert_eq!(action_of(true, true), Some(Action::Update));
        assert_eq!(action_of(true, false), Some(Action::Delete));
        assert_eq!(action_of(false, false), None);
    }

    #[test]
    fn test_rotated_position() {
        let next = rotated_position("mysql-bin.000008".into(), 4).unwrap();
        assert_eq!(next, BinlogPosition::new("mysql-bin.000008", 4));

        let err = rotated_position("mysql-bin.000009".into(), u64::from(u32::MAX) + 1).unwrap_err();
        assert!(err.to_string().contains("mysql-bin.000009"));
    }
}
