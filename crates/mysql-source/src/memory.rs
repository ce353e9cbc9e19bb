use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::Result;
use sync_core::{Row, TableRef};

use crate::catalog::Catalog;

struct MemoryTable {
    table: TableRef,
    pk_columns: Vec<String>,
    rows: Vec<Row>,
}

/// In-process [`Catalog`] holding tables in insertion order.
#[derive(Default)]
pub struct MemoryCatalog {
    tables: Vec<MemoryTable>,
    failing_pages: Mutex<HashSet<(TableRef, u64)>>,
    fetches: Mutex<Vec<(TableRef, u64, u64)>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: TableRef, pk_columns: Vec<String>, rows: Vec<Row>) -> Self {
        self.tables.push(MemoryTable {
            table,
            pk_columns,
            rows,
        });
        self
    }

    /// Make the page starting at `offset` fail once.
    pub fn fail_page_once(&self, table: TableRef, offset: u64) {
        self.failing_pages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((table, offset));
    }

    /// Every `fetch_page` call as `(table, offset, limit)`.
    pub fn fetches(&self) -> Vec<(TableRef, u64, u64)> {
        self.fetches.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn find(&self, table: &TableRef) -> Result<&MemoryTable> {
        self.tables
            .iter()
            .find(|t| &t.table == table)
            .ok_or_else(|| anyhow::anyhow!("Unknown table {table}"))
    }
}

#[async_trait::async_trait]
impl Catalog for MemoryCatalog {
    async fn list_tables(&self) -> Result<Vec<TableRef>> {
        Ok(self.tables.iter().map(|t| t.table.clone()).collect())
    }

    async fn primary_key_columns(&self, table: &TableRef) -> Result<Vec<String>> {
        Ok(self.find(table)?.pk_columns.clone())
    }

    async fn row_count(&self, table: &TableRef) -> Result<u64> {
        Ok(self.find(table)?.rows.len() as u64)
    }

    async fn fetch_page(&self, table: &TableRef, offset: u64, limit: u64) -> Result<Vec<Row>> {
        self.fetches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((table.clone(), offset, limit));
        if self
            .failing_pages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(table.clone(), offset))
        {
            anyhow::bail!("Injected failure for {table} at offset {offset}");
        }
        let rows = &self.find(table)?.rows;
        Ok(rows
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
