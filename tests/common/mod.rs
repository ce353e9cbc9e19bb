//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use fanout_sink::{Consumer, Result, SinkError};
use sync_core::{Action, CellValue, EventData, Row, RowChange, TableRef};
use tokio::sync::Semaphore;

/// One call received by a [`RecordingConsumer`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Accept(EventData),
    Batch(Vec<EventData>),
    Clear,
}

/// Consumer that records every call. It can be made to fail, or to wait
/// for a permit before each `accept`.
#[derive(Default)]
pub struct RecordingConsumer {
    calls: Mutex<Vec<Call>>,
    failing: AtomicBool,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `accept` first takes one permit from `gate`.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        let consumer = Self::default();
        consumer.failing.store(true, Ordering::SeqCst);
        consumer
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Ids of accepted events, read from the `id` column of their image.
    pub fn accepted_ids(&self) -> Vec<i64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Accept(event) => event_id(&event),
                _ => None,
            })
            .collect()
    }

    fn outcome(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(SinkError::backend("test", "rejected"))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl Consumer for RecordingConsumer {
    fn name(&self) -> &str {
        "recording"
    }

    async fn accept(&self, event: EventData) -> Result<()> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| SinkError::Closed("recording"))?
                .forget();
        }
        self.calls.lock().unwrap().push(Call::Accept(event));
        self.outcome()
    }

    async fn batch_accept(&self, events: &[EventData]) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Batch(events.to_vec()));
        self.outcome()
    }

    async fn clear_before_data(&self) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Clear);
        Ok(())
    }
}

pub fn event_id(event: &EventData) -> Option<i64> {
    match event.after().or(event.before())?.get("id")? {
        CellValue::Int64(id) => Some(*id),
        _ => None,
    }
}

pub fn users() -> TableRef {
    TableRef::new("shop", "users")
}

pub fn user_row(id: i64, name: &str) -> Row {
    let mut row = Row::new();
    row.insert("id".into(), CellValue::Int64(id));
    row.insert("user_name".into(), CellValue::text(name));
    row
}

fn user_tuple(id: i64, name: &str) -> Vec<CellValue> {
    vec![CellValue::Int64(id), CellValue::text(name)]
}

/// A decoded change of `table`, which has columns `id, user_name` keyed on `id`.
pub fn change(
    table: TableRef,
    action: Action,
    before: Option<(i64, &str)>,
    after: Option<(i64, &str)>,
) -> RowChange {
    RowChange {
        action,
        table,
        columns: vec!["id".to_string(), "user_name".to_string()].into(),
        pk_indices: vec![0].into(),
        before: before.map(|(id, name)| user_tuple(id, name)),
        after: after.map(|(id, name)| user_tuple(id, name)),
    }
}

pub fn insert(table: TableRef, id: i64, name: &str) -> RowChange {
    change(table, Action::Insert, None, Some((id, name)))
}
