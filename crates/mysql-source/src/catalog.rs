use anyhow::{Context, Result};
use mysql_async::prelude::*;
use mysql_async::Pool;
use sync_core::{Row, TableRef};

use crate::options::MySqlOptions;
use crate::position::BinlogPosition;
use crate::schema::query_pk_columns;
use crate::value::cell_from_value;

/// Schemas never offered for backfill.
pub const SYSTEM_SCHEMAS: [&str; 4] = ["information_schema", "mysql", "sys", "performance_schema"];

/// Read access to the source database for backfill.
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    /// Every user table, system schemas excluded.
    async fn list_tables(&self) -> Result<Vec<TableRef>>;

    /// Primary-key column names in key order; empty when the table has none.
    async fn primary_key_columns(&self, table: &TableRef) -> Result<Vec<String>>;

    async fn row_count(&self, table: &TableRef) -> Result<u64>;

    /// Rows `offset..offset + limit` in storage order.
    async fn fetch_page(&self, table: &TableRef, offset: u64, limit: u64) -> Result<Vec<Row>>;
}

fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn qualified(table: &TableRef) -> String {
    format!(
        "{}.{}",
        quote_identifier(&table.schema),
        quote_identifier(&table.name)
    )
}

/// [`Catalog`] over a `mysql_async` connection pool.
#[derive(Clone)]
pub struct MySqlCatalog {
    pool: Pool,
}

impl MySqlCatalog {
    pub fn new(options: &MySqlOptions) -> Self {
        Self {
            pool: Pool::new(options.opts()),
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Current binlog position from `SHOW MASTER STATUS`.
    pub async fn master_position(&self) -> Result<BinlogPosition> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .context("Failed to connect to MySQL")?;
        let row: Option<mysql_async::Row> = conn
            .query_first("SHOW MASTER STATUS")
            .await
            .context("Failed to execute SHOW MASTER STATUS")?;
        let row = row.ok_or_else(|| {
            anyhow::anyhow!("SHOW MASTER STATUS returned nothing; is binary logging enabled?")
        })?;
        let file: String = row
            .get("File")
            .ok_or_else(|| anyhow::anyhow!("Missing File in SHOW MASTER STATUS"))?;
        let position: u32 = row
            .get("Position")
            .ok_or_else(|| anyhow::anyhow!("Missing Position in SHOW MASTER STATUS"))?;
        Ok(BinlogPosition::new(file, position))
    }

    pub async fn disconnect(self) -> Result<()> {
        self.pool.disconnect().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Catalog for MySqlCatalog {
    async fn list_tables(&self) -> Result<Vec<TableRef>> {
        let mut conn = self.pool.get_conn().await?;
        let query = format!(
            "SELECT TABLE_SCHEMA, TABLE_NAME FROM INFORMATION_SCHEMA.TABLES
             WHERE TABLE_SCHEMA NOT IN ({}) AND TABLE_TYPE = 'BASE TABLE'
             ORDER BY TABLE_SCHEMA, TABLE_NAME",
            SYSTEM_SCHEMAS
                .iter()
                .map(|schema| format!("'{schema}'"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let tables: Vec<(String, String)> = conn.query(query).await?;
        Ok(tables
            .into_iter()
            .map(|(schema, name)| TableRef::new(schema, name))
            .collect())
    }

    async fn primary_key_columns(&self, table: &TableRef) -> Result<Vec<String>> {
        let mut conn = self.pool.get_conn().await?;
        query_pk_columns(&mut conn, table).await
    }

    async fn row_count(&self, table: &TableRef) -> Result<u64> {
        let mut conn = self.pool.get_conn().await?;
        let count: Option<u64> = conn
            .query_first(format!("SELECT COUNT(*) FROM {}", qualified(table)))
            .await?;
        Ok(count.unwrap_or(0))
    }

    async fn fetch_page(&self, table: &TableRef, offset: u64, limit: u64) -> Result<Vec<Row>> {
        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<mysql_async::Row> = conn
            .exec(
                format!("SELECT * FROM {} LIMIT ? OFFSET ?", qualified(table)),
                (limit, offset),
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|mut row| {
                let columns = row.columns();
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, column)| {
                        let value = row.take::<mysql_async::Value, _>(i).unwrap_or(mysql_async::Value::NULL);
                        (
                            column.name_str().into_owned(),
                            cell_from_value(value, Some(column.column_type())),
                        )
                    })
                    .collect()
            })
            .collect())
    }
}
