use fanout_sink::Result;

/// Key-value operations used by [`KeyValueSink`](crate::KeyValueSink).
///
/// Every method issues a single request regardless of how many entries it
/// carries.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Set every key to its value.
    async fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()>;

    /// Delete every key.
    async fn delete_many(&self, keys: Vec<String>) -> Result<()>;

    /// Set fields of the hash stored at `key`.
    async fn hash_set(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> Result<()>;

    /// Delete fields of the hash stored at `key`.
    async fn hash_delete(&self, key: &str, fields: Vec<String>) -> Result<()>;

    /// Delete every key starting with `prefix`. Returns the number of keys removed.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64>;
}

#[async_trait::async_trait]
impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    async fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        (**self).set_many(entries).await
    }

    async fn delete_many(&self, keys: Vec<String>) -> Result<()> {
        (**self).delete_many(keys).await
    }

    async fn hash_set(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> Result<()> {
        (**self).hash_set(key, fields).await
    }

    async fn hash_delete(&self, key: &str, fields: Vec<String>) -> Result<()> {
        (**self).hash_delete(key, fields).await
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64> {
        (**self).delete_by_prefix(prefix).await
    }
}
