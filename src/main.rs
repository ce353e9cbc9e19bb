//! Command-line interface for binlog-fanout
//!
//! # Usage Examples
//!
//! ```bash
//! # Backfill configured rules, then stream live changes
//! binlog-fanout run --config config.yaml
//!
//! # Record the binlog position used for streaming
//! binlog-fanout run --config config.yaml --emit-checkpoints
//!
//! # Resume streaming at a known position, without clearing or backfill
//! binlog-fanout run --config config.yaml --start-position "mysql-bin.000003:1547"
//!
//! # Print the latest recorded position
//! binlog-fanout checkpoint --phase backfill_end
//!
//! # Validate a configuration file
//! binlog-fanout check-config --config config.yaml
//! ```

use std::path::PathBuf;

use anyhow::Context;
use binlog_fanout::{AppConfig, RuleSet, RunOptions};
use checkpoint::{Checkpoint, CheckpointConfig, SyncManager, SyncPhase};
use clap::{Parser, Subcommand};
use mysql_source::BinlogPosition;

const DEFAULT_CHECKPOINT_DIR: &str = ".binlog-fanout-checkpoints";

#[derive(Parser)]
#[command(name = "binlog-fanout")]
#[command(about = "Fan MySQL binlog row changes out to Redis, Elasticsearch and the log")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backfill, then stream live changes until stopped
    Run {
        /// Configuration file; a missing file runs the default log rule
        #[arg(long, default_value = "config.yaml", env = "FANOUT_CONFIG")]
        config: PathBuf,

        /// Write the captured binlog position before and after backfill
        #[arg(long)]
        emit_checkpoints: bool,

        /// Directory to write checkpoint files
        #[arg(long, default_value = DEFAULT_CHECKPOINT_DIR)]
        checkpoint_dir: PathBuf,

        /// Stream from this position (`file:offset`) and skip clearing and backfill
        #[arg(long, value_name = "POSITION")]
        start_position: Option<String>,
    },

    /// Parse the configuration, compile every rule and print them
    CheckConfig {
        #[arg(long, default_value = "config.yaml", env = "FANOUT_CONFIG")]
        config: PathBuf,
    },

    /// Print the latest checkpoint of a phase
    Checkpoint {
        /// backfill_start or backfill_end
        #[arg(long, default_value = "backfill_end")]
        phase: String,

        #[arg(long, default_value = DEFAULT_CHECKPOINT_DIR)]
        checkpoint_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            emit_checkpoints,
            checkpoint_dir,
            start_position,
        } => {
            let app_config = AppConfig::load(&config)
                .with_context(|| format!("Failed to load config from {}", config.display()))?;
            let start_position = start_position
                .as_deref()
                .map(BinlogPosition::from_cli_string)
                .transpose()
                .context("Invalid --start-position")?;
            let options = RunOptions {
                checkpoints: CheckpointConfig {
                    emit_checkpoints,
                    checkpoint_dir: Some(checkpoint_dir),
                },
                start_position,
            };
            binlog_fanout::run(app_config, options).await?;
        }
        Commands::CheckConfig { config } => {
            let app_config = AppConfig::load(&config)
                .with_context(|| format!("Failed to load config from {}", config.display()))?;
            let rules = RuleSet::compile(&app_config)?;
            println!("{}: {} rule(s)", app_config.app_name, rules.len());
            for rule in rules.iter() {
                println!(
                    "  {:<20} {:<6} init={:<5} clear={:<5} {}",
                    rule.name,
                    rule.config.sync_target,
                    rule.config.init_data,
                    rule.config.clear_before_data,
                    rule.pattern
                );
            }
        }
        Commands::Checkpoint {
            phase,
            checkpoint_dir,
        } => {
            let phase = SyncPhase::parse(&phase)?;
            let manager = SyncManager::new(CheckpointConfig {
                emit_checkpoints: false,
                checkpoint_dir: Some(checkpoint_dir),
            });
            let file = manager.read_latest_checkpoint(phase).await?;
            let position: BinlogPosition = file.parse()?;
            println!("{} ({})", position.to_cli_string(), file.created_at);
        }
    }

    Ok(())
}
