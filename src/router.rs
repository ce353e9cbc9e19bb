//! Event router: fans decoded row changes out to rule queues.

use anyhow::Result;
use mysql_source::RowEventHandler;
use regex::Regex;
use sync_core::{Action, EventData, RowChange, TableRef};
use tokio::sync::mpsc;

struct Route {
    rule: String,
    pattern: Regex,
    queue: mpsc::Sender<EventData>,
}

/// Publishes every row change to the queue of each rule whose pattern
/// occurs in the change's `schema.table`.
///
/// Publishing waits while a queue is full. The replication loop awaits
/// [`Router::route`] inline, so one slow rule holds back the whole stream.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, rule: impl Into<String>, pattern: Regex, queue: mpsc::Sender<EventData>) {
        self.routes.push(Route {
            rule: rule.into(),
            pattern,
            queue,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Publish `change` to every matching rule. Returns how many rules
    /// received it.
    ///
    /// Fails when a matching rule's queue is closed, which only happens
    /// after its worker stopped.
    pub async fn route(&self, change: &RowChange) -> Result<usize> {
        let qualified = change.table.qualified();
        let matching: Vec<&Route> = self
            .routes
            .iter()
            .filter(|route| route.pattern.is_match(&qualified))
            .collect();
        if matching.is_empty() {
            return Ok(0);
        }
        let Some(event) = event_from_change(change) else {
            tracing::warn!(
                table = %change.table,
                action = %change.action,
                "Row change is missing its row image, skipping"
            );
            return Ok(0);
        };
        for route in &matching {
            if route.queue.send(event.clone()).await.is_err() {
                anyhow::bail!("Queue of rule '{}' is closed", route.rule);
            }
        }
        Ok(matching.len())
    }
}

/// Build the per-rule event of a row change by naming its tuples.
///
/// `None` when the images required by the action are missing.
pub fn event_from_change(change: &RowChange) -> Option<EventData> {
    let before = change.before.as_deref().map(|values| change.image(values));
    let after = change.after.as_deref().map(|values| change.image(values));
    let table = change.table.clone();
    let pk_columns = change.pk_columns();
    match (change.action, before, after) {
        (Action::Insert, _, Some(after)) => Some(EventData::insert(table, pk_columns, after)),
        (Action::Update, Some(before), Some(after)) => {
            Some(EventData::update(table, pk_columns, before, after))
        }
        (Action::Delete, Some(before), _) => Some(EventData::delete(table, pk_columns, before)),
        _ => None,
    }
}

#[async_trait::async_trait]
impl RowEventHandler for Router {
    fn wants(&self, table: &TableRef) -> bool {
        let qualified = table.qualified();
        self.routes
            .iter()
            .any(|route| route.pattern.is_match(&qualified))
    }

    async fn on_row(&self, change: RowChange) -> Result<()> {
        self.route(&change).await?;
        Ok(())
    }
}
