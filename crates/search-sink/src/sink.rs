use std::sync::Arc;

use serde::Deserialize;
use sync_core::{EventData, Row};
use transform::RecordTransform;

use fanout_sink::{apply_batch, Consumer, KeyResolver, RecordWriter, Result};

use crate::index::{BulkItem, DocumentIndex};
use crate::indexer::BulkIndexer;
use crate::version::ApiVersion;

/// The `elasticsearchRule` section of a rule.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElasticsearchRule {
    pub index_name: String,
}

/// Document consumer for one rule.
///
/// Documents are always encoded as JSON, whatever serialization format the
/// rule names.
pub struct DocumentSink<I> {
    index: Arc<I>,
    indexer: BulkIndexer,
    version: ApiVersion,
    rule: ElasticsearchRule,
    keys: KeyResolver,
    transform: RecordTransform,
}

impl<I: DocumentIndex> DocumentSink<I> {
    pub fn new(
        index: Arc<I>,
        indexer: BulkIndexer,
        version: ApiVersion,
        rule: ElasticsearchRule,
        keys: KeyResolver,
        transform: RecordTransform,
    ) -> Self {
        Self {
            index,
            indexer,
            version,
            rule,
            keys,
            transform,
        }
    }
}

#[async_trait::async_trait]
impl<I: DocumentIndex> RecordWriter for DocumentSink<I> {
    type Record = BulkItem;

    fn sink_name(&self) -> &'static str {
        "elasticsearch"
    }

    fn build(&self, id: String, image: &Row) -> Result<BulkItem> {
        Ok(BulkItem {
            index: self.rule.index_name.clone(),
            id,
            body: self.transform.encode_json(image)?,
        })
    }

    async fn remove(&self, ids: Vec<String>) -> Result<()> {
        // Buffered upserts of the same ids must land before they are deleted
        self.indexer.flush().await?;
        let deleted = self.index.delete_by_ids(&self.rule.index_name, ids).await?;
        tracing::debug!(index = %self.rule.index_name, deleted, "Deleted documents");
        Ok(())
    }

    async fn upsert(&self, records: Vec<BulkItem>) -> Result<()> {
        for item in records {
            self.indexer.add(item).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<I: DocumentIndex> Consumer for DocumentSink<I> {
    fn name(&self) -> &str {
        match self.version {
            ApiVersion::V7 => "es7",
            ApiVersion::V8 => "es8",
        }
    }

    async fn batch_accept(&self, events: &[EventData]) -> Result<()> {
        apply_batch(self, &self.keys, events).await
    }

    async fn clear_before_data(&self) -> Result<()> {
        let deleted = self.index.delete_all(&self.rule.index_name).await?;
        tracing::info!(
            index = %self.rule.index_name,
            deleted,
            "Cleared {} index",
            self.version
        );
        Ok(())
    }
}
