use std::collections::BTreeMap;
use std::sync::Mutex;

use fanout_sink::Result;

use crate::store::KeyValueStore;

#[derive(Debug, Clone, PartialEq)]
enum StoredValue {
    Bytes(Vec<u8>),
    Hash(BTreeMap<String, Vec<u8>>),
}

/// In-process [`KeyValueStore`] that records every request it receives.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<BTreeMap<String, StoredValue>>,
    requests: Mutex<Vec<&'static str>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.lock_data().get(key) {
            Some(StoredValue::Bytes(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn hash_get(&self, key: &str, field: &str) -> Option<Vec<u8>> {
        match self.lock_data().get(key) {
            Some(StoredValue::Hash(fields)) => fields.get(field).cloned(),
            _ => None,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock_data().keys().cloned().collect()
    }

    /// Names of the requests issued so far, in order.
    pub fn requests(&self) -> Vec<&'static str> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, request: &'static str) {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
    }

    fn lock_data(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredValue>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        self.record("mset");
        let mut data = self.lock_data();
        for (key, value) in entries {
            data.insert(key, StoredValue::Bytes(value));
        }
        Ok(())
    }

    async fn delete_many(&self, keys: Vec<String>) -> Result<()> {
        self.record("del");
        let mut data = self.lock_data();
        for key in keys {
            data.remove(&key);
        }
        Ok(())
    }

    async fn hash_set(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> Result<()> {
        self.record("hset");
        let mut data = self.lock_data();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| StoredValue::Hash(BTreeMap::new()));
        if let StoredValue::Bytes(_) = entry {
            *entry = StoredValue::Hash(BTreeMap::new());
        }
        if let StoredValue::Hash(hash) = entry {
            hash.extend(fields);
        }
        Ok(())
    }

    async fn hash_delete(&self, key: &str, fields: Vec<String>) -> Result<()> {
        self.record("hdel");
        let mut data = self.lock_data();
        if let Some(StoredValue::Hash(hash)) = data.get_mut(key) {
            for field in fields {
                hash.remove(&field);
            }
            if hash.is_empty() {
                data.remove(key);
            }
        }
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64> {
        self.record("scan+unlink");
        let mut data = self.lock_data();
        let before = data.len();
        data.retain(|key, _| !key.starts_with(prefix));
        Ok((before - data.len()) as u64)
    }
}
