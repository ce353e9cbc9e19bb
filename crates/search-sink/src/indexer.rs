//! Asynchronous bulk indexer.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fanout_sink::{Result, SinkError};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::index::{BulkItem, DocumentIndex};

const COMMAND_BUFFER: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub struct IndexerSettings {
    /// Buffered documents are sent at least this often
    pub flush_interval: Duration,
    /// Buffered documents are sent as soon as their bodies reach this size
    pub flush_bytes: usize,
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            flush_bytes: 5 * 1024 * 1024,
        }
    }
}

type Owner = Arc<str>;

enum Command {
    Add(Owner, BulkItem),
    Flush(Owner, oneshot::Sender<Result<()>>),
    Close(oneshot::Sender<Result<()>>),
}

/// Handle to a background task that batches documents into `_bulk` requests.
///
/// Clones share the same task and buffer. Each handle has an owner, normally
/// a rule name, set with [`BulkIndexer::for_rule`]. A timer- or size-triggered
/// flush that fails cannot return its error to whoever queued the documents,
/// so the error is kept for every owner with documents in the failed request
/// and reported by that owner's next [`BulkIndexer::add`].
#[derive(Clone)]
pub struct BulkIndexer {
    tx: mpsc::Sender<Command>,
    failures: Arc<Mutex<HashMap<Owner, String>>>,
    owner: Owner,
}

impl BulkIndexer {
    pub fn spawn<I>(index: Arc<I>, settings: IndexerSettings) -> Self
    where
        I: DocumentIndex + 'static,
    {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let failures = Arc::new(Mutex::new(HashMap::new()));
        tokio::spawn(run(index, settings, rx, failures.clone()));
        Self {
            tx,
            failures,
            owner: Arc::from("default"),
        }
    }

    /// A handle on the same task whose failures are tracked under `rule`.
    pub fn for_rule(&self, rule: &str) -> Self {
        Self {
            tx: self.tx.clone(),
            failures: self.failures.clone(),
            owner: Arc::from(rule),
        }
    }

    /// Queue one document, then report a failed background flush of
    /// documents this handle queued earlier.
    pub async fn add(&self, item: BulkItem) -> Result<()> {
        self.tx
            .send(Command::Add(self.owner.clone(), item))
            .await
            .map_err(|_| SinkError::Closed("bulk indexer"))?;
        match self.take_failure() {
            Some(message) => Err(SinkError::Backend {
                sink: "elasticsearch",
                message,
            }),
            None => Ok(()),
        }
    }

    /// Send every buffered document now. Fails only when the request fails
    /// and it carried documents of this handle.
    pub async fn flush(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Flush(self.owner.clone(), reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| SinkError::Closed("bulk indexer"))?
    }

    /// Flush and stop the background task.
    pub async fn close(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Close(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| SinkError::Closed("bulk indexer"))?
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SinkError::Closed("bulk indexer"))
    }

    fn take_failure(&self) -> Option<String> {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.owner)
    }
}

#[derive(Default)]
struct Buffer {
    items: Vec<BulkItem>,
    owners: BTreeSet<Owner>,
    bytes: usize,
}

impl Buffer {
    fn push(&mut self, owner: Owner, item: BulkItem) {
        self.bytes += item.body.len();
        self.owners.insert(owner);
        self.items.push(item);
    }
}

/// Send the buffer as one request. Returns the owners of the documents sent.
async fn flush<I: DocumentIndex>(index: &I, buffer: &mut Buffer) -> (BTreeSet<Owner>, Result<()>) {
    if buffer.items.is_empty() {
        return (BTreeSet::new(), Ok(()));
    }
    let Buffer { items, owners, .. } = std::mem::take(buffer);
    let count = items.len();
    let result = index.bulk_index(items).await;
    if result.is_ok() {
        tracing::debug!(count, "Flushed bulk indexer");
    }
    (owners, result)
}

fn record_failure<'a>(
    failures: &Mutex<HashMap<Owner, String>>,
    owners: impl IntoIterator<Item = &'a Owner>,
    err: &SinkError,
) {
    let mut failures = failures.lock().unwrap_or_else(|e| e.into_inner());
    for owner in owners {
        tracing::error!(rule = %owner, "Bulk indexing failed: {err}");
        failures.insert(owner.clone(), err.to_string());
    }
}

async fn flush_in_background<I: DocumentIndex>(
    index: &I,
    buffer: &mut Buffer,
    failures: &Mutex<HashMap<Owner, String>>,
) {
    let (owners, result) = flush(index, buffer).await;
    if let Err(e) = result {
        record_failure(failures, &owners, &e);
    }
}

async fn run<I: DocumentIndex>(
    index: Arc<I>,
    settings: IndexerSettings,
    mut rx: mpsc::Receiver<Command>,
    failures: Arc<Mutex<HashMap<Owner, String>>>,
) {
    let mut buffer = Buffer::default();
    let mut ticker = tokio::time::interval(settings.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Add(owner, item)) => {
                    buffer.push(owner, item);
                    if buffer.bytes >= settings.flush_bytes {
                        flush_in_background(index.as_ref(), &mut buffer, &failures).await;
                    }
                }
                Some(Command::Flush(requester, reply)) => {
                    let (owners, result) = flush(index.as_ref(), &mut buffer).await;
                    let reply_with = match result {
                        Ok(()) => Ok(()),
                        Err(e) => {
                            record_failure(&failures, owners.iter().filter(|o| **o != requester), &e);
                            if owners.contains(&requester) {
                                Err(e)
                            } else {
                                Ok(())
                            }
                        }
                    };
                    let _ = reply.send(reply_with);
                }
                Some(Command::Close(reply)) => {
                    let (_, result) = flush(index.as_ref(), &mut buffer).await;
                    let _ = reply.send(result);
                    break;
                }
                None => {
                    flush_in_background(index.as_ref(), &mut buffer, &failures).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                flush_in_background(index.as_ref(), &mut buffer, &failures).await;
            }
        }
    }
    tracing::debug!("Bulk indexer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryIndex;

    fn item(id: &str, body: &str) -> BulkItem {
        BulkItem {
            index: "users".into(),
            id: id.into(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn slow_settings() -> IndexerSettings {
        IndexerSettings {
            flush_interval: Duration::from_secs(3600),
            flush_bytes: usize::MAX,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_flush() {
        let index = Arc::new(MemoryIndex::new());
        let indexer = BulkIndexer::spawn(index.clone(), slow_settings());

        indexer.add(item("1", r#"{"a":1}"#)).await.unwrap();
        indexer.add(item("2", r#"{"a":2}"#)).await.unwrap();
        indexer.flush().await.unwrap();

        assert_eq!(index.document_count("users"), 2);
        assert_eq!(index.requests(), vec!["bulk"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flush() {
        let index = Arc::new(MemoryIndex::new());
        let indexer = BulkIndexer::spawn(
            index.clone(),
            IndexerSettings {
                flush_interval: Duration::from_secs(1),
                flush_bytes: usize::MAX,
            },
        );

        indexer.add(item("1", r#"{"a":1}"#)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(index.document_count("users"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_flush() {
        let index = Arc::new(MemoryIndex::new());
        let indexer = BulkIndexer::spawn(
            index.clone(),
            IndexerSettings {
                flush_interval: Duration::from_secs(3600),
                flush_bytes: 10,
            },
        );

        indexer.add(item("1", r#"{"a":1}"#)).await.unwrap();
        indexer.add(item("2", r#"{"a":2}"#)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(index.document_count("users"), 2);
        assert_eq!(index.requests(), vec!["bulk"]);
    }

    fn doc(index: &str, id: &str) -> BulkItem {
        BulkItem {
            index: index.into(),
            id: id.into(),
            body: br#"{"a":1}"#.to_vec(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_failure_reported_to_its_rule_only() {
        let index = Arc::new(MemoryIndex::new());
        let shared = BulkIndexer::spawn(
            index.clone(),
            IndexerSettings {
                flush_interval: Duration::from_secs(1),
                flush_bytes: usize::MAX,
            },
        );
        let orders = shared.for_rule("orders");
        let users = shared.for_rule("users");

        index.fail_bulk_requests(true);
        orders.add(doc("orders", "1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        index.fail_bulk_requests(false);

        users.add(doc("users", "7")).await.unwrap();
        users.flush().await.unwrap();
        assert!(index.get("users", "7").is_some());

        // Reported once, and the new document is still queued
        let err = orders.add(doc("orders", "2")).await.unwrap_err();
        assert!(matches!(err, SinkError::Backend { .. }));
        orders.flush().await.unwrap();
        assert!(index.get("orders", "1").is_none());
        assert!(index.get("orders", "2").is_some());
        orders.add(doc("orders", "3")).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_flush_reported_to_every_rule_in_the_request() {
        let index = Arc::new(MemoryIndex::new());
        let shared = BulkIndexer::spawn(index.clone(), slow_settings());
        let orders = shared.for_rule("orders");
        let users = shared.for_rule("users");
        let payments = shared.for_rule("payments");

        orders.add(doc("orders", "1")).await.unwrap();
        users.add(doc("users", "1")).await.unwrap();
        index.fail_bulk_requests(true);

        assert!(users.flush().await.is_err());
        // Nothing of its own was lost
        assert!(payments.flush().await.is_ok());
        index.fail_bulk_requests(false);

        assert!(orders.add(doc("orders", "2")).await.is_err());
        assert!(payments.add(doc("payments", "1")).await.is_ok());
        users.add(doc("users", "2")).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_and_stops() {
        let index = Arc::new(MemoryIndex::new());
        let indexer = BulkIndexer::spawn(index.clone(), slow_settings());

        indexer.add(item("1", r#"{"a":1}"#)).await.unwrap();
        indexer.close().await.unwrap();
        assert_eq!(index.document_count("users"), 1);

        let err = indexer.add(item("2", r#"{"a":2}"#)).await.unwrap_err();
        assert!(matches!(err, SinkError::Closed(_)));
    }
}
