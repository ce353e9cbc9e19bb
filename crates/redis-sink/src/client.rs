use std::collections::HashMap;
use std::time::Duration;

use fanout_sink::{Result, SinkError};
use fred::prelude::{
    ClientLike, EventInterface, FredResult, HashesInterface, KeysInterface, Pool,
    ReconnectPolicy, ServerConfig, TcpConfig,
};
use fred::types::{Builder, Key};
use futures::future::join_all;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info};

use crate::store::KeyValueStore;

const DEFAULT_PORT: u16 = 6379;
const POOL_SIZE: usize = 4;
const SCAN_PAGE_SIZE: u32 = 100;

/// Connection settings, read from the `redis` section of the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RedisOptions {
    /// `host:port` pairs. More than one address selects cluster mode.
    pub addrs: Vec<String>,
    pub db: u8,
    pub username: String,
    pub password: String,
    /// Sentinel master name. When set, `addrs` are the sentinel nodes.
    pub master_name: String,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            addrs: vec![format!("127.0.0.1:{DEFAULT_PORT}")],
            db: 0,
            username: String::new(),
            password: String::new(),
            master_name: String::new(),
        }
    }
}

impl RedisOptions {
    fn hosts(&self) -> Vec<(String, u16)> {
        self.addrs.iter().map(|addr| split_host_port(addr)).collect()
    }

    fn server_config(&self) -> ServerConfig {
        let mut hosts = self.hosts();
        if !self.master_name.trim().is_empty() {
            ServerConfig::new_sentinel(hosts, self.master_name.trim().to_string())
        } else if hosts.len() > 1 {
            ServerConfig::new_clustered(hosts)
        } else {
            let (host, port) = hosts
                .pop()
                .unwrap_or_else(|| ("127.0.0.1".to_string(), DEFAULT_PORT));
            ServerConfig::new_centralized(host, port)
        }
    }
}

fn split_host_port(addr: &str) -> (String, u16) {
    match addr.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (addr.to_string(), DEFAULT_PORT),
        },
        None => (addr.to_string(), DEFAULT_PORT),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Escape glob metacharacters so a key prefix matches literally in `SCAN MATCH`.
fn glob_escape(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Pooled Redis client shared by every key-value rule.
#[derive(Clone)]
pub struct RedisClient {
    pool: Pool,
}

impl RedisClient {
    /// Connect and wait until every pooled connection is up.
    pub async fn connect(options: &RedisOptions) -> FredResult<Self> {
        let pool = Builder::default_centralized()
            .with_config(|config| {
                config.server = options.server_config();
                config.database = (options.db > 0).then_some(options.db);
                config.username = non_empty(&options.username);
                config.password = non_empty(&options.password);
            })
            .with_connection_config(|config| {
                config.connection_timeout = Duration::from_secs(3);
                config.internal_command_timeout = Duration::from_secs(2);
                config.reconnect_on_auth_error = true;
                config.tcp = TcpConfig {
                    nodelay: Some(true),
                    ..Default::default()
                };
            })
            .with_performance_config(|config| {
                config.default_command_timeout = Duration::from_secs(2);
            })
            .set_policy(ReconnectPolicy::new_exponential(0, 100, 2000, 2))
            .build_pool(POOL_SIZE)?;

        for client in pool.clients() {
            let mut error_rx = client.error_rx();
            tokio::spawn(async move {
                loop {
                    match error_rx.recv().await {
                        Ok((error, Some(server))) => error!("Redis client ({server:?}) error: {error:?}"),
                        Ok((error, None)) => error!("Redis client error: {error:?}"),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            });
        }

        let handles = pool.connect_pool();
        debug!("Waiting for Redis connections");
        pool.wait_for_connect().await?;
        info!(addrs = ?options.addrs, "Connected to Redis");

        tokio::spawn(async move {
            let _results = join_all(handles).await;
        });

        Ok(Self { pool })
    }

    pub async fn quit(&self) {
        if let Err(e) = self.pool.quit().await {
            error!("Failed to close Redis pool: {e}");
        }
    }
}

fn backend(err: fred::error::Error) -> SinkError {
    SinkError::backend("redis", err)
}

#[async_trait::async_trait]
impl KeyValueStore for RedisClient {
    async fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        // Later entries for the same key win
        let values: HashMap<String, Vec<u8>> = entries.into_iter().collect();
        self.pool.mset(values).await.map_err(backend)
    }

    async fn delete_many(&self, keys: Vec<String>) -> Result<()> {
        self.pool.del::<i64, _>(keys).await.map_err(backend)?;
        Ok(())
    }

    async fn hash_set(&self, key: &str, fields: Vec<(String, Vec<u8>)>) -> Result<()> {
        let values: HashMap<String, Vec<u8>> = fields.into_iter().collect();
        self.pool
            .hset::<i64, _, _>(key, values)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn hash_delete(&self, key: &str, fields: Vec<String>) -> Result<()> {
        self.pool
            .hdel::<i64, _, _>(key, fields)
            .await
            .map_err(backend)?;
        Ok(())
    }

    // Scans one node; on a cluster only keys owned by that node are removed
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64> {
        let pattern = format!("{}*", glob_escape(prefix));
        let mut cursor = "0".to_string();
        let mut total_deleted = 0u64;

        loop {
            let (next_cursor, keys): (String, Vec<Key>) = self
                .pool
                .scan_page(cursor, pattern.clone(), Some(SCAN_PAGE_SIZE), None)
                .await
                .map_err(backend)?;

            if !keys.is_empty() {
                let deleted: i64 = self.pool.unlink(keys).await.map_err(backend)?;
                total_deleted += deleted as u64;
            }

            cursor = next_cursor;
            if cursor == "0" {
                break;
            }
        }

        Ok(total_deleted)
    }
}
