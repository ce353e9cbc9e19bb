//! Elasticsearch document sink.
//!
//! Upserts are handed to a [`BulkIndexer`] that batches them into `_bulk`
//! requests on a timer or when its buffer fills up. Removals and clears go
//! straight to the cluster as `_delete_by_query` requests.
//!
//! API v7 and v8 share one implementation; [`ApiVersion`] only changes the
//! media types sent with each request.

mod client;
mod index;
mod indexer;
mod memory;
mod sink;
mod version;

pub use client::{ElasticClient, ElasticsearchOptions};
pub use index::{BulkItem, DocumentIndex};
pub use indexer::{BulkIndexer, IndexerSettings};
pub use memory::MemoryIndex;
pub use sink::{DocumentSink, ElasticsearchRule};
pub use version::{parse_server_version, ApiVersion};
