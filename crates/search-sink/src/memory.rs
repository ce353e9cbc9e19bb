use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use fanout_sink::{Result, SinkError};
use serde_json::Value;

use crate::index::{BulkItem, DocumentIndex};

/// In-process [`DocumentIndex`] that records every request it receives.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    documents: Mutex<BTreeMap<(String, String), Value>>,
    requests: Mutex<Vec<&'static str>>,
    fail_bulk: AtomicBool,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: &str, id: &str) -> Option<Value> {
        self.lock_documents()
            .get(&(index.to_string(), id.to_string()))
            .cloned()
    }

    pub fn document_count(&self, index: &str) -> usize {
        self.lock_documents()
            .keys()
            .filter(|(name, _)| name == index)
            .count()
    }

    /// Names of the requests issued so far, in order.
    pub fn requests(&self) -> Vec<&'static str> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Make `bulk_index` fail until switched back.
    pub fn fail_bulk_requests(&self, fail: bool) {
        self.fail_bulk.store(fail, Ordering::SeqCst);
    }

    fn record(&self, request: &'static str) {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
    }

    fn lock_documents(&self) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), Value>> {
        self.documents.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl DocumentIndex for MemoryIndex {
    async fn bulk_index(&self, items: Vec<BulkItem>) -> Result<()> {
        self.record("bulk");
        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(SinkError::backend("elasticsearch", "bulk rejected"));
        }
        let mut documents = self.lock_documents();
        for item in items {
            let body: Value = serde_json::from_slice(&item.body)
                .map_err(|e| SinkError::backend("elasticsearch", e))?;
            documents.insert((item.index, item.id), body);
        }
        Ok(())
    }

    async fn delete_by_ids(&self, index: &str, ids: Vec<String>) -> Result<u64> {
        self.record("delete_by_ids");
        let mut documents = self.lock_documents();
        let mut deleted = 0;
        for id in ids {
            if documents.remove(&(index.to_string(), id)).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn delete_all(&self, index: &str) -> Result<u64> {
        self.record("delete_all");
        let mut documents = self.lock_documents();
        let before = documents.len();
        documents.retain(|(name, _), _| name != index);
        Ok((before - documents.len()) as u64)
    }
}
