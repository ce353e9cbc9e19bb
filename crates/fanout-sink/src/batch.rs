//! Two-phase batch policy shared by keyed sinks.

use std::collections::HashSet;

use sync_core::{EventData, Row};

use crate::error::Result;
use crate::keys::KeyResolver;

/// Storage operations of a keyed sink.
///
/// Implementors only describe how to build a record and how to issue the
/// two bulk calls; [`apply_batch`] decides what goes into each call.
#[async_trait::async_trait]
pub trait RecordWriter: Send + Sync {
    /// Upsert payload for one record.
    type Record: Send;

    /// Sink name used in log lines.
    fn sink_name(&self) -> &'static str;

    /// Build the upsert payload of an after-image stored under `id`.
    fn build(&self, id: String, image: &Row) -> Result<Self::Record>;

    /// Remove every record in `ids` with a single request.
    async fn remove(&self, ids: Vec<String>) -> Result<()>;

    /// Write every record with a single request.
    async fn upsert(&self, records: Vec<Self::Record>) -> Result<()>;
}

/// Apply a batch of events to a keyed sink.
///
/// 1. Ids from every delete/update before-image are collected and removed
///    with one call.
/// 2. Payloads from every insert/update after-image are upserted with one
///    call.
///
/// Either call is skipped when it has nothing to do. Records whose id
/// resolves to the empty string are skipped.
pub async fn apply_batch<W>(writer: &W, keys: &KeyResolver, events: &[EventData]) -> Result<()>
where
    W: RecordWriter + ?Sized,
{
    let mut removals = Vec::new();
    let mut seen = HashSet::new();
    let mut upserts = Vec::new();

    for event in events {
        if let (true, Some(before)) = (event.action.removes(), event.before()) {
            let id = keys.resolve(event, before);
            if id.is_empty() {
                tracing::warn!(
                    sink = writer.sink_name(),
                    table = %event.table,
                    action = %event.action,
                    "Skipping removal of record without key"
                );
            } else if seen.insert(id.clone()) {
                removals.push(id);
            }
        }

        if let (true, Some(after)) = (event.action.writes(), event.after()) {
            let id = keys.resolve(event, after);
            if id.is_empty() {
                tracing::warn!(
                    sink = writer.sink_name(),
                    table = %event.table,
                    action = %event.action,
                    "Skipping write of record without key"
                );
                continue;
            }
            upserts.push(writer.build(id, after)?);
        }
    }

    if !removals.is_empty() {
        tracing::debug!(sink = writer.sink_name(), count = removals.len(), "Removing records");
        writer.remove(removals).await?;
    }
    if !upserts.is_empty() {
        tracing::debug!(sink = writer.sink_name(), count = upserts.len(), "Upserting records");
        writer.upsert(upserts).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use sync_core::{CellValue, TableRef};

    #[derive(Debug, PartialEq)]
    enum Call {
        Remove(Vec<String>),
        Upsert(Vec<(String, String)>),
    }

    #[derive(Default)]
    struct RecordingWriter {
        calls: Mutex<Vec<Call>>,
    }

    #[async_trait::async_trait]
    impl RecordWriter for RecordingWriter {
        type Record = (String, String);

        fn sink_name(&self) -> &'static str {
            "recording"
        }

        fn build(&self, id: String, image: &Row) -> Result<Self::Record> {
            let name = image.get("name").map(transform::render_text).unwrap_or_default();
            Ok((id, name))
        }

        async fn remove(&self, ids: Vec<String>) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Remove(ids));
            Ok(())
        }

        async fn upsert(&self, records: Vec<Self::Record>) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Upsert(records));
            Ok(())
        }
    }

    fn users() -> TableRef {
        TableRef::new("shop", "users")
    }

    fn image(id: i64, name: &str) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), CellValue::Int64(id));
        row.insert("name".into(), CellValue::text(name));
        row
    }

    fn pk() -> Vec<String> {
        vec!["id".into()]
    }

    #[tokio::test]
    async fn test_delete_then_insert_same_key() {
        let writer = RecordingWriter::default();
        let events = vec![
            EventData::delete(users(), pk(), image(5, "old")),
            EventData::insert(users(), pk(), image(5, "new")),
        ];
        apply_batch(&writer, &KeyResolver::default(), &events).await.unwrap();

        let calls = writer.calls.into_inner().unwrap();
        assert_eq!(
            calls,
            vec![
                Call::Remove(vec!["5".into()]),
                Call::Upsert(vec![("5".into(), "new".into())]),
            ]
        );
    }

    #[tokio::test]
    async fn test_insert_then_delete_same_key_still_removes_first() {
        let writer = RecordingWriter::default();
        let events = vec![
            EventData::insert(users(), pk(), image(5, "new")),
            EventData::delete(users(), pk(), image(5, "old")),
        ];
        apply_batch(&writer, &KeyResolver::default(), &events).await.unwrap();

        let calls = writer.calls.into_inner().unwrap();
        assert_eq!(
            calls,
            vec![
                Call::Remove(vec!["5".into()]),
                Call::Upsert(vec![("5".into(), "new".into())]),
            ]
        );
    }

    #[tokio::test]
    async fn test_update_removes_old_key_and_writes_new() {
        let writer = RecordingWriter::default();
        let events = vec![EventData::update(users(), pk(), image(1, "a"), image(2, "b"))];
        apply_batch(&writer, &KeyResolver::default(), &events).await.unwrap();

        let calls = writer.calls.into_inner().unwrap();
        assert_eq!(
            calls,
            vec![
                Call::Remove(vec!["1".into()]),
                Call::Upsert(vec![("2".into(), "b".into())]),
            ]
        );
    }

    #[tokio::test]
    async fn test_inserts_only_skip_removal() {
        let writer = RecordingWriter::default();
        let events: Vec<_> = (1..=3)
            .map(|i| EventData::insert(users(), pk(), image(i, "x")))
            .collect();
        apply_batch(&writer, &KeyResolver::default(), &events).await.unwrap();

        let calls = writer.calls.into_inner().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], Call::Upsert(records) if records.len() == 3));
    }

    #[tokio::test]
    async fn test_keyless_records_are_skipped() {
        let writer = RecordingWriter::default();
        let events = vec![
            EventData::insert(TableRef::new("shop", "audit"), vec![], image(1, "x")),
            EventData::delete(TableRef::new("shop", "audit"), vec![], image(1, "x")),
        ];
        apply_batch(&writer, &KeyResolver::default(), &events).await.unwrap();
        assert!(writer.calls.into_inner().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_issues_no_calls() {
        let writer = RecordingWriter::default();
        apply_batch(&writer, &KeyResolver::default(), &[]).await.unwrap();
        assert!(writer.calls.into_inner().unwrap().is_empty());
    }
}
