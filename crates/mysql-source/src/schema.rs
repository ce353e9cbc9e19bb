//! Column order and primary keys of source tables.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use mysql_async::prelude::*;
use mysql_async::{Conn, Pool};
use sync_core::TableRef;
use tokio::sync::Mutex;

/// Column layout of a table, shared by every change of that table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub columns: Arc<[String]>,
    pub pk_indices: Arc<[usize]>,
}

impl TableSchema {
    pub fn new(columns: Vec<String>, pk_columns: &[String]) -> Self {
        let pk_indices: Vec<usize> = pk_columns
            .iter()
            .filter_map(|pk| columns.iter().position(|column| column == pk))
            .collect();
        Self {
            columns: columns.into(),
            pk_indices: pk_indices.into(),
        }
    }

    pub fn pk_columns(&self) -> Vec<String> {
        self.pk_indices
            .iter()
            .filter_map(|&i| self.columns.get(i).cloned())
            .collect()
    }
}

pub(crate) async fn query_columns(conn: &mut Conn, table: &TableRef) -> Result<Vec<String>> {
    let columns: Vec<String> = conn
        .exec(
            "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS
             WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
             ORDER BY ORDINAL_POSITION",
            (&table.schema, &table.name),
        )
        .await?;
    Ok(columns)
}

pub(crate) async fn query_pk_columns(conn: &mut Conn, table: &TableRef) -> Result<Vec<String>> {
    let columns: Vec<String> = conn
        .exec(
            "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
             WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY'
             ORDER BY ORDINAL_POSITION",
            (&table.schema, &table.name),
        )
        .await?;
    Ok(columns)
}

/// Lazily-populated [`TableSchema`] lookup backed by `INFORMATION_SCHEMA`.
///
/// Entries are dropped by [`SchemaCache::invalidate`] whenever the binlog
/// carries DDL, so the next change of a table reloads its layout.
#[derive(Clone)]
pub struct SchemaCache {
    pool: Pool,
    tables: Arc<Mutex<HashMap<TableRef, TableSchema>>>,
}

impl SchemaCache {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            tables: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get(&self, table: &TableRef) -> Result<TableSchema> {
        if let Some(schema) = self.tables.lock().await.get(table) {
            return Ok(schema.clone());
        }

        let mut conn = self.pool.get_conn().await?;
        let columns = query_columns(&mut conn, table).await?;
        if columns.is_empty() {
            anyhow::bail!("Table {table} not found in INFORMATION_SCHEMA");
        }
        let pk_columns = query_pk_columns(&mut conn, table).await?;
        let schema = TableSchema::new(columns, &pk_columns);
        tracing::debug!(table = %table, columns = schema.columns.len(), "Loaded table schema");

        self.tables
            .lock()
            .await
            .insert(table.clone(), schema.clone());
        Ok(schema)
    }

    pub async fn invalidate(&self) {
        self.tables.lock().await.clear();
    }
}
