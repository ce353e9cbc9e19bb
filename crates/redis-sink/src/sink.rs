use serde::Deserialize;
use sync_core::{CellValue, EventData, Row};
use transform::{render_text, RecordTransform};

use fanout_sink::{apply_batch, Consumer, KeyResolver, RecordWriter, Result};

use crate::store::KeyValueStore;

/// Storage layout of a key-value rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum KeyType {
    /// One string key per record, named `<keyName>:<id>`
    #[default]
    String,
    /// One hash named `<keyName>`, one field per record
    Hash,
}

impl From<String> for KeyType {
    fn from(name: String) -> Self {
        if name == "hash" {
            KeyType::Hash
        } else {
            KeyType::String
        }
    }
}

/// The `redisRule` section of a rule.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RedisRule {
    pub key_name: String,
    pub key_type: KeyType,
}

/// Key-value consumer for one rule.
pub struct KeyValueSink<S> {
    store: S,
    rule: RedisRule,
    keys: KeyResolver,
    transform: RecordTransform,
}

impl<S: KeyValueStore> KeyValueSink<S> {
    pub fn new(store: S, rule: RedisRule, keys: KeyResolver, transform: RecordTransform) -> Self {
        Self {
            store,
            rule,
            keys,
            transform,
        }
    }

    fn string_key(&self, id: &str) -> String {
        format!("{}:{}", self.rule.key_name, id)
    }

    /// A single include column is stored as its plain text value; anything
    /// else is stored as the encoded record.
    fn value(&self, image: &Row) -> Result<Vec<u8>> {
        match self.transform.filter.single_include() {
            Some(column) => {
                let value = image.get(column).unwrap_or(&CellValue::Null);
                Ok(render_text(value).into_bytes())
            }
            None => Ok(self.transform.encode(image)?),
        }
    }
}

#[async_trait::async_trait]
impl<S: KeyValueStore> RecordWriter for KeyValueSink<S> {
    type Record = (String, Vec<u8>);

    fn sink_name(&self) -> &'static str {
        "redis"
    }

    fn build(&self, id: String, image: &Row) -> Result<Self::Record> {
        let value = self.value(image)?;
        match self.rule.key_type {
            KeyType::Hash => Ok((id, value)),
            KeyType::String => Ok((self.string_key(&id), value)),
        }
    }

    async fn remove(&self, ids: Vec<String>) -> Result<()> {
        match self.rule.key_type {
            KeyType::Hash => self.store.hash_delete(&self.rule.key_name, ids).await,
            KeyType::String => {
                let keys = ids.iter().map(|id| self.string_key(id)).collect();
                self.store.delete_many(keys).await
            }
        }
    }

    async fn upsert(&self, records: Vec<Self::Record>) -> Result<()> {
        match self.rule.key_type {
            KeyType::Hash => self.store.hash_set(&self.rule.key_name, records).await,
            KeyType::String => self.store.set_many(records).await,
        }
    }
}

#[async_trait::async_trait]
impl<S: KeyValueStore> Consumer for KeyValueSink<S> {
    fn name(&self) -> &str {
        "redis"
    }

    async fn batch_accept(&self, events: &[EventData]) -> Result<()> {
        apply_batch(self, &self.keys, events).await
    }

    async fn clear_before_data(&self) -> Result<()> {
        match self.rule.key_type {
            KeyType::Hash => {
                self.store
                    .delete_many(vec![self.rule.key_name.clone()])
                    .await?;
                tracing::info!(key = %self.rule.key_name, "Cleared Redis hash");
            }
            KeyType::String => {
                let prefix = format!("{}:", self.rule.key_name);
                let deleted = self.store.delete_by_prefix(&prefix).await?;
                tracing::info!(prefix = %prefix, deleted, "Cleared Redis keys");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use std::sync::Arc;
    use sync_core::TableRef;
    use transform::{ColumnFilter, FieldNameFormat, SerializationFormat};

    fn users() -> TableRef {
        TableRef::new("shop", "users")
    }

    fn pk() -> Vec<String> {
        vec!["id".into()]
    }

    fn image(id: i64, name: &str) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), CellValue::Int64(id));
        row.insert("user_name".into(), CellValue::text(name));
        row
    }

    fn sink(
        store: Arc<MemoryStore>,
        key_type: KeyType,
        include: Vec<String>,
    ) -> KeyValueSink<Arc<MemoryStore>> {
        KeyValueSink::new(
            store,
            RedisRule {
                key_name: "users".into(),
                key_type,
            },
            KeyResolver::default(),
            RecordTransform::new(
                ColumnFilter::new(include, vec![]),
                FieldNameFormat::LowerCamelCase,
                SerializationFormat::Json,
            ),
        )
    }

    fn json(bytes: Vec<u8>) -> serde_json::Value {
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_string_layout_uses_namespaced_keys() {
        let store = Arc::new(MemoryStore::new());
        let sink = sink(store.clone(), KeyType::String, vec![]);

        sink.accept(EventData::insert(users(), pk(), image(1, "ann")))
            .await
            .unwrap();

        assert_eq!(store.keys(), vec!["users:1".to_string()]);
        let value = json(store.get("users:1").unwrap());
        assert_eq!(value["userName"], "ann");
        assert_eq!(value["id"], 1);
    }

    #[tokio::test]
    async fn test_hash_layout_uses_fields() {
        let store = Arc::new(MemoryStore::new());
        let sink = sink(store.clone(), KeyType::Hash, vec![]);

        sink.batch_accept(&[
            EventData::insert(users(), pk(), image(1, "ann")),
            EventData::insert(users(), pk(), image(2, "bob")),
        ])
        .await
        .unwrap();

        assert_eq!(store.keys(), vec!["users".to_string()]);
        assert_eq!(json(store.hash_get("users", "2").unwrap())["userName"], "bob");
        assert_eq!(store.requests(), vec!["hset"]);
    }

    #[tokio::test]
    async fn test_single_include_column_stores_plain_value() {
        let store = Arc::new(MemoryStore::new());
        let sink = sink(store.clone(), KeyType::String, vec!["user_name".into()]);

        sink.accept(EventData::insert(users(), pk(), image(7, "carol")))
            .await
            .unwrap();
        assert_eq!(store.get("users:7").unwrap(), b"carol".to_vec());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = Arc::new(MemoryStore::new());
        let sink = sink(store.clone(), KeyType::String, vec![]);

        sink.batch_accept(&[
            EventData::insert(users(), pk(), image(1, "ann")),
            EventData::insert(users(), pk(), image(2, "bob")),
        ])
        .await
        .unwrap();
        sink.batch_accept(&[
            EventData::update(users(), pk(), image(1, "ann"), image(3, "ann")),
            EventData::delete(users(), pk(), image(2, "bob")),
        ])
        .await
        .unwrap();

        assert_eq!(store.keys(), vec!["users:3".to_string()]);
        assert_eq!(store.requests(), vec!["mset", "del", "mset"]);
    }

    #[tokio::test]
    async fn test_hash_removal_deletes_fields() {
        let store = Arc::new(MemoryStore::new());
        let sink = sink(store.clone(), KeyType::Hash, vec![]);

        sink.accept(EventData::insert(users(), pk(), image(1, "ann")))
            .await
            .unwrap();
        sink.accept(EventData::delete(users(), pk(), image(1, "ann")))
            .await
            .unwrap();
        assert!(store.hash_get("users", "1").is_none());
        assert_eq!(store.requests(), vec!["hset", "hdel"]);
    }

    #[tokio::test]
    async fn test_clear_string_layout_removes_prefix_only() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_many(vec![
                ("users:1".into(), b"a".to_vec()),
                ("users:2".into(), b"b".to_vec()),
                ("usersettings".into(), b"c".to_vec()),
                ("orders:1".into(), b"d".to_vec()),
            ])
            .await
            .unwrap();

        sink(store.clone(), KeyType::String, vec![])
            .clear_before_data()
            .await
            .unwrap();
        assert_eq!(
            store.keys(),
            vec!["orders:1".to_string(), "usersettings".to_string()]
        );
    }

    #[tokio::test]
    async fn test_clear_hash_layout_removes_hash_key() {
        let store = Arc::new(MemoryStore::new());
        store
            .hash_set("users", vec![("1".into(), b"a".to_vec())])
            .await
            .unwrap();
        store
            .set_many(vec![("users:1".into(), b"x".to_vec())])
            .await
            .unwrap();

        sink(store.clone(), KeyType::Hash, vec![])
            .clear_before_data()
            .await
            .unwrap();
        assert_eq!(store.keys(), vec!["users:1".to_string()]);
    }

    #[test]
    fn test_key_type_from_name() {
        assert_eq!(KeyType::from("hash".to_string()), KeyType::Hash);
        assert_eq!(KeyType::from("string".to_string()), KeyType::String);
        assert_eq!(KeyType::from("".to_string()), KeyType::String);
    }
}
