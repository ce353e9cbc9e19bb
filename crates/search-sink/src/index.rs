use fanout_sink::Result;
use serde_json::{json, Value};

/// One document queued for indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    pub index: String,
    pub id: String,
    /// JSON document body
    pub body: Vec<u8>,
}

impl BulkItem {
    /// Append this item to an NDJSON `_bulk` body.
    pub fn write_ndjson(&self, out: &mut Vec<u8>) {
        let action = json!({ "index": { "_index": self.index, "_id": self.id } });
        out.extend_from_slice(action.to_string().as_bytes());
        out.push(b'\n');
        let body = self.body.strip_suffix(b"\n").unwrap_or(&self.body);
        out.extend_from_slice(body);
        out.push(b'\n');
    }
}

/// Query matching documents by id.
pub(crate) fn ids_query(ids: &[String]) -> Value {
    json!({ "query": { "ids": { "values": ids } } })
}

/// Query matching every document.
pub(crate) fn match_all_query() -> Value {
    json!({ "query": { "match_all": {} } })
}

/// Document operations used by the document sink and its bulk indexer.
#[async_trait::async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Index every item with one `_bulk` request.
    async fn bulk_index(&self, items: Vec<BulkItem>) -> Result<()>;

    /// Delete documents of `index` whose id is in `ids`. Returns the number deleted.
    async fn delete_by_ids(&self, index: &str, ids: Vec<String>) -> Result<u64>;

    /// Delete every document of `index`. Returns the number deleted.
    async fn delete_all(&self, index: &str) -> Result<u64>;
}
