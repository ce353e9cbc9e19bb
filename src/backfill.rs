//! Initial load of existing rows before live streaming starts.

use anyhow::Context;
use fanout_sink::Consumer;
use mysql_source::Catalog;
use sync_core::{EventData, TableRef};

use crate::config::{BackfillConfig, SinkErrorPolicy};
use crate::rules::SyncRule;

/// What a backfill run delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub tables: usize,
    pub rows: u64,
    pub pages: u64,
    pub failed_pages: u64,
}

/// Backfill every table of `tables` that `rule` matches into `consumer`.
///
/// Each page of `config.page_size` rows is delivered as one
/// [`Consumer::batch_accept`] call of synthetic inserts. A page that cannot
/// be read is logged and skipped. An empty table ends the rule's backfill
/// unless `stop_on_empty_table` is off, in which case only that table is
/// skipped.
pub async fn backfill_rule<Cat, C>(
    catalog: &Cat,
    tables: &[TableRef],
    rule: &SyncRule,
    consumer: &C,
    config: &BackfillConfig,
    policy: SinkErrorPolicy,
) -> anyhow::Result<BackfillReport>
where
    Cat: Catalog + ?Sized,
    C: Consumer + ?Sized,
{
    let mut report = BackfillReport::default();
    let mut matching: Vec<&TableRef> = tables.iter().filter(|t| rule.matches(t)).collect();
    let mut seen = std::collections::HashSet::new();
    matching.retain(|t| seen.insert(*t));

    for table in matching {
        let pk_columns = catalog
            .primary_key_columns(table)
            .await
            .with_context(|| format!("Failed to read primary key of {table}"))?;
        let count = catalog
            .row_count(table)
            .await
            .with_context(|| format!("Failed to count rows of {table}"))?;

        if count < 1 {
            if config.stop_on_empty_table {
                tracing::warn!(
                    rule = %rule.name,
                    table = %table,
                    "Table is empty, stopping backfill of the remaining tables of this rule"
                );
                break;
            }
            tracing::info!(rule = %rule.name, table = %table, "Table is empty, skipping");
            continue;
        }

        let page_size = config.page_size;
        let page_total = count.div_ceil(page_size);
        tracing::info!(
            rule = %rule.name,
            table = %table,
            count,
            pages = page_total,
            "Backfilling table"
        );
        report.tables += 1;

        for page in 0..page_total {
            let offset = page * page_size;
            let rows = match catalog.fetch_page(table, offset, page_size).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::error!(
                        rule = %rule.name,
                        table = %table,
                        offset,
                        "Failed to read backfill page: {e:#}"
                    );
                    report.failed_pages += 1;
                    continue;
                }
            };
            let events: Vec<EventData> = rows
                .into_iter()
                .map(|row| EventData::insert(table.clone(), pk_columns.clone(), row))
                .collect();
            if events.is_empty() {
                continue;
            }

            let size = events.len() as u64;
            match consumer.batch_accept(&events).await {
                Ok(()) => {
                    report.pages += 1;
                    report.rows += size;
                }
                Err(e) => {
                    report.failed_pages += 1;
                    policy.handle(&rule.name, &format!("backfill page at offset {offset} of {table}"), e)?;
                }
            }
        }
    }

    tracing::info!(
        rule = %rule.name,
        tables = report.tables,
        rows = report.rows,
        failed_pages = report.failed_pages,
        "Backfill finished"
    );
    Ok(report)
}
