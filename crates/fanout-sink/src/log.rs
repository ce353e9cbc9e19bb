use sync_core::{EventData, Row};
use transform::CoercedRow;

use crate::error::Result;
use crate::keys::KeyResolver;
use crate::traits::Consumer;

/// Writes every event to the log at info level.
///
/// Used for rules whose target is neither a key-value store nor a document
/// index.
#[derive(Debug, Clone)]
pub struct LogSink {
    rule: String,
    keys: KeyResolver,
}

impl LogSink {
    pub fn new(rule: impl Into<String>, keys: KeyResolver) -> Self {
        Self {
            rule: rule.into(),
            keys,
        }
    }

    fn log_event(&self, event: &EventData) {
        let image = event.after().or(event.before());
        let key = image
            .map(|row| self.keys.resolve(event, row))
            .unwrap_or_default();
        tracing::info!(
            rule = %self.rule,
            action = %event.action,
            table = %event.table,
            pk_columns = ?event.pk_columns,
            key = %key,
            before = %render(event.before()),
            after = %render(event.after()),
            "Row change"
        );
    }
}

fn render(row: Option<&Row>) -> String {
    match row {
        Some(row) => serde_json::to_string(&CoercedRow(row)).unwrap_or_else(|e| e.to_string()),
        None => "null".to_string(),
    }
}

#[async_trait::async_trait]
impl Consumer for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn batch_accept(&self, events: &[EventData]) -> Result<()> {
        for event in events {
            self.log_event(event);
        }
        Ok(())
    }

    async fn clear_before_data(&self) -> Result<()> {
        Ok(())
    }
}
