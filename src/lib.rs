//! binlog-fanout
//!
//! Routes MySQL row changes to Redis, Elasticsearch and the log.
//!
//! ```text
//! binlog ──► Router ──► rule queue ──► worker ──► Consumer ──► sink
//!                 └──► rule queue ──► worker ──► Consumer ──► sink
//! catalog ──► backfill ─────────────────────────► Consumer
//! ```
//!
//! - [`config`] loads the YAML configuration.
//! - [`rules`] compiles each rule's table pattern.
//! - [`router`] publishes every change to the queue of each matching rule.
//! - [`worker`] drains one rule queue into its consumer.
//! - [`backfill`] loads existing rows before streaming starts.
//! - [`consumer`] builds each rule's consumer and owns the shared clients.
//! - [`app`] wires everything together for the `run` command.

pub mod app;
pub mod backfill;
pub mod config;
pub mod consumer;
pub mod router;
pub mod rules;
pub mod worker;

pub use app::{run, RunOptions};
pub use backfill::{backfill_rule, BackfillReport};
pub use config::{AppConfig, BackfillConfig, ConfigError, RuleConfig, SinkErrorPolicy, SinkTarget};
pub use consumer::{RuleConsumer, SinkClients};
pub use router::{event_from_change, Router};
pub use rules::{RuleSet, SyncRule};
pub use worker::{run_worker, Workers};
