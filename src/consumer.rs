//! Per-rule consumers and the sink clients they share.

use std::sync::Arc;

use anyhow::Context;
use fanout_sink::{Consumer, LogSink, Result};
use redis_sink::{KeyValueSink, RedisClient, RedisOptions};
use search_sink::{
    ApiVersion, BulkIndexer, DocumentSink, ElasticClient, ElasticsearchOptions, IndexerSettings,
};
use sync_core::EventData;

use crate::config::{AppConfig, SinkTarget};
use crate::rules::SyncRule;

/// The consumer bound to one rule, chosen by its `syncTarget`.
pub enum RuleConsumer {
    Log(LogSink),
    KeyValue(KeyValueSink<RedisClient>),
    Document(DocumentSink<ElasticClient>),
}

#[async_trait::async_trait]
impl Consumer for RuleConsumer {
    fn name(&self) -> &str {
        match self {
            RuleConsumer::Log(sink) => sink.name(),
            RuleConsumer::KeyValue(sink) => sink.name(),
            RuleConsumer::Document(sink) => sink.name(),
        }
    }

    async fn accept(&self, event: EventData) -> Result<()> {
        match self {
            RuleConsumer::Log(sink) => sink.accept(event).await,
            RuleConsumer::KeyValue(sink) => sink.accept(event).await,
            RuleConsumer::Document(sink) => sink.accept(event).await,
        }
    }

    async fn batch_accept(&self, events: &[EventData]) -> Result<()> {
        match self {
            RuleConsumer::Log(sink) => sink.batch_accept(events).await,
            RuleConsumer::KeyValue(sink) => sink.batch_accept(events).await,
            RuleConsumer::Document(sink) => sink.batch_accept(events).await,
        }
    }

    async fn clear_before_data(&self) -> Result<()> {
        match self {
            RuleConsumer::Log(sink) => sink.clear_before_data().await,
            RuleConsumer::KeyValue(sink) => sink.clear_before_data().await,
            RuleConsumer::Document(sink) => sink.clear_before_data().await,
        }
    }
}

struct SearchBackend {
    client: Arc<ElasticClient>,
    indexer: BulkIndexer,
}

/// Network clients shared by every rule that targets them.
///
/// Each client is connected the first time a rule needs it, so a
/// configuration without Redis rules never touches Redis.
pub struct SinkClients {
    redis_options: RedisOptions,
    search_options: ElasticsearchOptions,
    indexer_settings: IndexerSettings,
    redis: Option<RedisClient>,
    es7: Option<SearchBackend>,
    es8: Option<SearchBackend>,
}

impl SinkClients {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let indexer_settings = IndexerSettings {
            flush_interval: config.flush_interval()?,
            ..Default::default()
        };
        Ok(Self {
            redis_options: config.redis.clone(),
            search_options: config.elasticsearch.clone(),
            indexer_settings,
            redis: None,
            es7: None,
            es8: None,
        })
    }

    async fn redis(&mut self) -> anyhow::Result<RedisClient> {
        if let Some(client) = &self.redis {
            return Ok(client.clone());
        }
        let client = RedisClient::connect(&self.redis_options)
            .await
            .context("Failed to connect to Redis")?;
        tracing::info!(addrs = ?self.redis_options.addrs, "Connected to Redis");
        self.redis = Some(client.clone());
        Ok(client)
    }

    async fn search(&mut self, version: ApiVersion) -> anyhow::Result<(Arc<ElasticClient>, BulkIndexer)> {
        let slot = match version {
            ApiVersion::V7 => &mut self.es7,
            ApiVersion::V8 => &mut self.es8,
        };
        if let Some(backend) = slot {
            return Ok((backend.client.clone(), backend.indexer.clone()));
        }
        let client = Arc::new(
            ElasticClient::connect(&self.search_options, version)
                .await
                .with_context(|| format!("Failed to connect to Elasticsearch ({version})"))?,
        );
        let indexer = BulkIndexer::spawn(client.clone(), self.indexer_settings);
        tracing::info!(addrs = ?self.search_options.addrs, %version, "Connected to Elasticsearch");
        *slot = Some(SearchBackend {
            client: client.clone(),
            indexer: indexer.clone(),
        });
        Ok((client, indexer))
    }

    /// Build the consumer for `rule`, connecting its client if needed.
    pub async fn consumer_for(&mut self, rule: &SyncRule) -> anyhow::Result<RuleConsumer> {
        let keys = rule.key_resolver();
        let consumer = match rule.config.sync_target {
            SinkTarget::Log => RuleConsumer::Log(LogSink::new(rule.name.clone(), keys)),
            SinkTarget::Redis => RuleConsumer::KeyValue(KeyValueSink::new(
                self.redis().await?,
                rule.config.redis_rule.clone(),
                keys,
                rule.transform(),
            )),
            SinkTarget::Es7 | SinkTarget::Es8 => {
                let version = if rule.config.sync_target == SinkTarget::Es7 {
                    ApiVersion::V7
                } else {
                    ApiVersion::V8
                };
                let (client, indexer) = self.search(version).await?;
                RuleConsumer::Document(DocumentSink::new(
                    client,
                    indexer.for_rule(&rule.name),
                    version,
                    rule.config.elasticsearch_rule.clone(),
                    keys,
                    rule.transform(),
                ))
            }
        };
        Ok(consumer)
    }

    /// Flush the bulk indexers and disconnect.
    pub async fn close(&mut self) -> anyhow::Result<()> {
        let mut result = Ok(());
        for backend in [self.es7.take(), self.es8.take()].into_iter().flatten() {
            if let Err(e) = backend.indexer.close().await {
                tracing::error!(version = %backend.client.version(), "Failed to flush bulk indexer: {e}");
                result = Err(e).context("Failed to flush bulk indexer");
            }
        }
        if let Some(client) = self.redis.take() {
            client.quit().await;
        }
        result
    }
}
