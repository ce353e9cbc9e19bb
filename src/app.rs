//! Startup and shutdown of the whole router.

use std::sync::Arc;

use anyhow::Context;
use checkpoint::{CheckpointConfig, SyncManager, SyncPhase};
use fanout_sink::Consumer;
use mysql_source::{BinlogPosition, BinlogSource, Catalog, MySqlCatalog, ReplicationSource};
use tokio::sync::mpsc;

use crate::backfill::backfill_rule;
use crate::config::AppConfig;
use crate::consumer::SinkClients;
use crate::router::Router;
use crate::rules::RuleSet;
use crate::worker::Workers;

/// Command-line options of `run` that are not part of the config file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub checkpoints: CheckpointConfig,
    /// Resume streaming here instead of at the current master position.
    /// Clearing and backfill are skipped when set.
    pub start_position: Option<BinlogPosition>,
}

/// Run until replication fails, a worker aborts, or the process is asked to
/// stop.
///
/// Startup order: capture the binlog position, then for each rule start its
/// worker, clear its sink and backfill it, then start streaming from the
/// captured position. Any failure before streaming starts is fatal.
pub async fn run(config: AppConfig, options: RunOptions) -> anyhow::Result<()> {
    let rules = RuleSet::compile(&config)?;
    let catalog = MySqlCatalog::new(&config.mysql);
    let source = BinlogSource::new(config.mysql.clone(), catalog.clone());
    let checkpoints = SyncManager::new(options.checkpoints);
    let policy = config.sink_error_policy;

    let resuming = options.start_position.is_some();
    let position = match options.start_position {
        Some(position) => position,
        None => source
            .current_position()
            .await
            .context("Failed to capture the binlog position")?,
    };
    tracing::info!(app = %config.app_name, resuming, "Starting from binlog position {position}");

    let tables = if resuming {
        Vec::new()
    } else {
        checkpoints
            .emit_checkpoint(&position, SyncPhase::BackfillStart)
            .await?;
        catalog
            .list_tables()
            .await
            .context("Failed to list source tables")?
    };

    let mut clients = SinkClients::new(&config)?;
    let mut router = Router::new();
    let mut workers = Workers::new();

    for rule in rules.iter() {
        let consumer = Arc::new(
            clients
                .consumer_for(rule)
                .await
                .with_context(|| format!("Failed to set up the sink of rule '{}'", rule.name))?,
        );
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        router.add_route(rule.name.clone(), rule.pattern.clone(), tx);
        workers.spawn(rule.name.clone(), consumer.clone(), rx, policy);
        tracing::info!(
            rule = %rule.name,
            target = %rule.config.sync_target,
            pattern = %rule.pattern,
            "Rule started"
        );

        if resuming {
            continue;
        }
        if rule.config.clear_before_data {
            consumer
                .clear_before_data()
                .await
                .with_context(|| format!("Failed to clear the sink of rule '{}'", rule.name))?;
        }
        if rule.config.init_data {
            backfill_rule(
                &catalog,
                &tables,
                rule,
                consumer.as_ref(),
                &config.backfill,
                policy,
            )
            .await
            .with_context(|| format!("Backfill of rule '{}' failed", rule.name))?;
        }
    }

    if !resuming {
        checkpoints
            .emit_checkpoint(&position, SyncPhase::BackfillEnd)
            .await?;
    }

    let router = Arc::new(router);
    let mut replication = tokio::spawn(async move { source.run_from(position, router.as_ref()).await });

    let outcome = tokio::select! {
        joined = &mut replication => match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.context("Replication stopped")),
            Err(e) => Err(anyhow::anyhow!("Replication task failed: {e}")),
        },
        Some((rule, result)) = workers.next_stopped() => match result {
            Ok(_) => Err(anyhow::anyhow!("Rule worker '{rule}' stopped unexpectedly")),
            Err(e) => Err(e.context(format!("Rule '{rule}' stopped"))),
        },
        _ = shutdown_signal() => {
            tracing::info!("Shutdown requested");
            Ok(())
        }
    };

    // Dropping the router with the replication task closes every queue
    replication.abort();
    let _ = replication.await;
    let drained = workers.join_all().await;
    let closed = clients.close().await;
    if let Err(e) = catalog.disconnect().await {
        tracing::warn!("Failed to disconnect from MySQL: {e:#}");
    }

    outcome?;
    drained?;
    closed?;
    tracing::info!("Stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
