//! Configuration file.
//!
//! The router reads one YAML file with camelCase keys. Every section has
//! defaults, so a missing file still yields a runnable configuration: one
//! `default` rule that logs every change of every table.
//!
//! ```yaml
//! mysql: { addr: 127.0.0.1:3306, username: canal, password: canal, serverId: 88 }
//! redis: { addrs: [127.0.0.1:6379] }
//! rules:
//!   users:
//!     tableRegex: "shop\\.users"
//!     syncTarget: redis
//!     initData: true
//!     redisRule: { keyName: users, keyType: hash }
//! ```

mod duration;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mysql_source::MySqlOptions;
use redis_sink::{RedisOptions, RedisRule};
use search_sink::{ElasticsearchOptions, ElasticsearchRule};
use serde::Deserialize;
use thiserror::Error;
use transform::{FieldNameFormat, SerializationFormat};

pub use duration::parse_duration;

pub const DEFAULT_APP_NAME: &str = "binlog-fanout";
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_PAGE_SIZE: u64 = 10_000;
/// Pattern of the rule used when no rules are configured; matches every table.
pub const MATCH_ALL_TABLES: &str = r".*\..*";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Rule '{rule}' has an invalid tableRegex '{pattern}': {source}")]
    InvalidPattern {
        rule: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Rule '{rule}': {message}")]
    InvalidRule { rule: String, message: String },

    #[error("Invalid {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

/// Where a rule delivers its events.
///
/// Configured by name; anything other than `redis`, `es7` or `es8` selects
/// the log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum SinkTarget {
    #[default]
    Log,
    Redis,
    Es7,
    Es8,
}

impl SinkTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkTarget::Log => "log",
            SinkTarget::Redis => "redis",
            SinkTarget::Es7 => "es7",
            SinkTarget::Es8 => "es8",
        }
    }
}

impl From<String> for SinkTarget {
    fn from(name: String) -> Self {
        match name.as_str() {
            "redis" => SinkTarget::Redis,
            "es7" => SinkTarget::Es7,
            "es8" => SinkTarget::Es8,
            _ => SinkTarget::Log,
        }
    }
}

impl std::fmt::Display for SinkTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens when a consumer fails to deliver a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkErrorPolicy {
    /// Log the failure, drop the batch and keep going
    #[default]
    Log,
    /// Stop the rule and shut the process down with an error
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackfillConfig {
    /// Rows per `batch_accept` call
    pub page_size: u64,
    /// Stop backfilling a rule at its first empty table instead of skipping
    /// just that table
    pub stop_on_empty_table: bool,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            stop_on_empty_table: true,
        }
    }
}

/// One entry of the `rules` map.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleConfig {
    /// Matched anywhere within `schema.table`
    pub table_regex: String,
    pub sync_target: SinkTarget,
    /// Backfill matching tables at startup
    pub init_data: bool,
    /// Remove everything the sink holds for this rule before backfill
    pub clear_before_data: bool,
    /// Column used as record id instead of the table's first primary-key column
    #[serde(rename = "customPKColumn")]
    pub custom_pk_column: String,
    pub serialization_format: SerializationFormat,
    pub include_column_names: Vec<String>,
    pub exclude_column_names: Vec<String>,
    pub field_name_format: FieldNameFormat,
    pub redis_rule: RedisRule,
    pub elasticsearch_rule: ElasticsearchRule,
}

impl RuleConfig {
    /// The rule used when none are configured.
    pub fn match_all() -> Self {
        Self {
            table_regex: MATCH_ALL_TABLES.to_string(),
            sync_target: SinkTarget::Log,
            serialization_format: SerializationFormat::Json,
            field_name_format: FieldNameFormat::UpperCamelCase,
            ..Default::default()
        }
    }
}

fn default_rules() -> BTreeMap<String, RuleConfig> {
    BTreeMap::from([("default".to_string(), RuleConfig::match_all())])
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub app_name: String,
    pub mysql: MySqlOptions,
    pub redis: RedisOptions,
    pub elasticsearch: ElasticsearchOptions,
    /// Pending events per rule before the router blocks
    pub queue_capacity: usize,
    pub sink_error_policy: SinkErrorPolicy,
    pub backfill: BackfillConfig,
    /// Rules by name; processed in name order
    pub rules: BTreeMap<String, RuleConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            mysql: MySqlOptions::default(),
            redis: RedisOptions::default(),
            elasticsearch: ElasticsearchOptions::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            sink_error_policy: SinkErrorPolicy::default(),
            backfill: BackfillConfig::default(),
            rules: default_rules(),
        }
    }
}

impl AppConfig {
    /// Load and validate the file at `path`. A missing file yields the
    /// defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_yaml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything that would otherwise fail at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queueCapacity",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.backfill.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "backfill.pageSize",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.rules.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "rules",
                message: "at least one rule is required".to_string(),
            });
        }
        self.flush_interval()?;

        for (name, rule) in &self.rules {
            regex::Regex::new(&rule.table_regex).map_err(|source| {
                ConfigError::InvalidPattern {
                    rule: name.clone(),
                    pattern: rule.table_regex.clone(),
                    source,
                }
            })?;
            match rule.sync_target {
                SinkTarget::Redis if rule.redis_rule.key_name.is_empty() => {
                    return Err(ConfigError::InvalidRule {
                        rule: name.clone(),
                        message: "redisRule.keyName is required for redis rules".to_string(),
                    });
                }
                SinkTarget::Es7 | SinkTarget::Es8
                    if rule.elasticsearch_rule.index_name.is_empty() =>
                {
                    return Err(ConfigError::InvalidRule {
                        rule: name.clone(),
                        message: format!(
                            "elasticsearchRule.indexName is required for {} rules",
                            rule.sync_target
                        ),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Bulk indexer flush interval.
    pub fn flush_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.elasticsearch.flush_interval).map_err(|e| {
            ConfigError::InvalidValue {
                field: "elasticsearch.flushInterval",
                message: format!("{e:#}"),
            }
        })
    }
}
