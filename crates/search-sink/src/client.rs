use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fanout_sink::{Result, SinkError};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;

use crate::index::{ids_query, match_all_query, BulkItem, DocumentIndex};
use crate::version::{parse_server_version, ApiVersion};

/// Connection settings, read from the `elasticsearch` section of the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElasticsearchOptions {
    pub addrs: Vec<String>,
    pub username: String,
    pub password: String,
    /// How often the bulk indexer flushes, e.g. `1s` or `500ms`
    pub flush_interval: String,
}

impl Default for ElasticsearchOptions {
    fn default() -> Self {
        Self {
            addrs: vec!["http://127.0.0.1:9200".to_string()],
            username: String::new(),
            password: String::new(),
            flush_interval: "1s".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RootInfo {
    version: VersionInfo,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    number: String,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct DeleteByQueryResponse {
    #[serde(default)]
    deleted: u64,
}

/// REST client for one Elasticsearch cluster. Requests rotate over the
/// configured addresses.
#[derive(Clone)]
pub struct ElasticClient {
    http: Client,
    addrs: Arc<[String]>,
    next: Arc<AtomicUsize>,
    credentials: Option<(String, String)>,
    version: ApiVersion,
}

impl ElasticClient {
    /// Build a client and check that the cluster answers on its root endpoint.
    pub async fn connect(options: &ElasticsearchOptions, version: ApiVersion) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SinkError::backend("elasticsearch", e))?;

        let addrs: Vec<String> = options
            .addrs
            .iter()
            .map(|addr| addr.trim_end_matches('/').to_string())
            .collect();
        if addrs.is_empty() {
            return Err(SinkError::backend(
                "elasticsearch",
                "no elasticsearch address configured",
            ));
        }

        let credentials = (!options.username.is_empty())
            .then(|| (options.username.clone(), options.password.clone()));

        let client = Self {
            http,
            addrs: addrs.into(),
            next: Arc::new(AtomicUsize::new(0)),
            credentials,
            version,
        };
        client.check_version().await?;
        Ok(client)
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    fn url(&self, path: &str) -> String {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.addrs.len();
        format!("{}{}", self.addrs[i], path)
    }

    fn request(&self, builder: RequestBuilder, content_type: &'static str) -> RequestBuilder {
        let builder = builder
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT, self.version.json_media_type());
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| SinkError::backend("elasticsearch", format!("{what}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::backend(
                "elasticsearch",
                format!("{what} returned status {status}: {body}"),
            ));
        }
        Ok(response)
    }

    async fn check_version(&self) -> Result<()> {
        let url = self.url("/");
        let response = self
            .send(self.request(self.http.get(&url), self.version.json_media_type()), "info")
            .await?;
        let info: RootInfo = response
            .json()
            .await
            .map_err(|e| SinkError::backend("elasticsearch", format!("info: {e}")))?;

        match parse_server_version(&info.version.number) {
            Ok(server) if server.major != self.version.major() => tracing::warn!(
                "Elasticsearch server is {} but the rule targets {}",
                server,
                self.version
            ),
            Ok(server) => tracing::info!("Connected to Elasticsearch {server}"),
            Err(e) => tracing::warn!(
                "Unrecognized Elasticsearch version '{}': {e}",
                info.version.number
            ),
        }
        Ok(())
    }

    async fn delete_by_query(&self, index: &str, query: Value) -> Result<u64> {
        let url = self.url(&format!("/{index}/_delete_by_query"));
        let response = self
            .send(
                self.request(self.http.post(&url), self.version.json_media_type())
                    .body(query.to_string()),
                "delete_by_query",
            )
            .await?;
        let body: DeleteByQueryResponse = response
            .json()
            .await
            .map_err(|e| SinkError::backend("elasticsearch", format!("delete_by_query: {e}")))?;
        Ok(body.deleted)
    }
}

/// First failure reason of a `_bulk` response, plus the number of failed items.
fn bulk_failures(items: &[Value]) -> (usize, Option<String>) {
    let failed: Vec<&Value> = items
        .iter()
        .filter_map(|item| item.as_object()?.values().next())
        .filter(|result| result.get("error").is_some())
        .collect();
    let reason = failed.first().map(|result| {
        let error = &result["error"];
        format!(
            "{} (id {}): {}",
            error["type"].as_str().unwrap_or("error"),
            result["_id"].as_str().unwrap_or("?"),
            error["reason"].as_str().unwrap_or("unknown reason")
        )
    });
    (failed.len(), reason)
}

#[async_trait::async_trait]
impl DocumentIndex for ElasticClient {
    async fn bulk_index(&self, items: Vec<BulkItem>) -> Result<()> {
        let mut body = Vec::new();
        for item in &items {
            item.write_ndjson(&mut body);
        }

        let url = self.url("/_bulk");
        let response = self
            .send(
                self.request(self.http.post(&url), self.version.ndjson_media_type())
                    .body(body),
                "bulk",
            )
            .await?;
        let result: BulkResponse = response
            .json()
            .await
            .map_err(|e| SinkError::backend("elasticsearch", format!("bulk: {e}")))?;

        if result.errors {
            let (count, reason) = bulk_failures(&result.items);
            return Err(SinkError::backend(
                "elasticsearch",
                format!(
                    "{count} of {} bulk items failed, first: {}",
                    items.len(),
                    reason.unwrap_or_default()
                ),
            ));
        }
        Ok(())
    }

    async fn delete_by_ids(&self, index: &str, ids: Vec<String>) -> Result<u64> {
        self.delete_by_query(index, ids_query(&ids)).await
    }

    async fn delete_all(&self, index: &str) -> Result<u64> {
        self.delete_by_query(index, match_all_query()).await
    }
}
