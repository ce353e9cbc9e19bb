//! Writing and reading checkpoint files.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::{Checkpoint, CheckpointFile, SyncPhase};

/// Where, and whether, checkpoints are written.
#[derive(Debug, Clone, Default)]
pub struct CheckpointConfig {
    pub emit_checkpoints: bool,
    pub checkpoint_dir: Option<PathBuf>,
}

impl CheckpointConfig {
    pub fn to_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            emit_checkpoints: true,
            checkpoint_dir: Some(dir.into()),
        }
    }

    pub fn should_emit_checkpoints(&self) -> bool {
        self.emit_checkpoints && self.checkpoint_dir.is_some()
    }
}

/// Filesystem checkpoint manager.
///
/// ```rust,ignore
/// let manager = SyncManager::new(CheckpointConfig::to_dir("/tmp/checkpoints"));
/// manager.emit_checkpoint(&position, SyncPhase::BackfillStart).await?;
/// let position: BinlogPosition = manager.read_checkpoint(SyncPhase::BackfillStart).await?;
/// ```
pub struct SyncManager {
    config: CheckpointConfig,
}

impl SyncManager {
    pub fn new(config: CheckpointConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    /// Write `checkpoint` as a new file for `phase`. Does nothing when
    /// emission is disabled.
    pub async fn emit_checkpoint<C: Checkpoint>(
        &self,
        checkpoint: &C,
        phase: SyncPhase,
    ) -> anyhow::Result<()> {
        if !self.config.emit_checkpoints {
            return Ok(());
        }
        let Some(dir) = &self.config.checkpoint_dir else {
            anyhow::bail!("No checkpoint directory configured");
        };
        std::fs::create_dir_all(dir)?;

        let file = CheckpointFile::new(checkpoint, phase)?;
        let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
        let path = dir.join(format!("checkpoint_{}_{}.json", phase.as_str(), timestamp));
        std::fs::write(&path, serde_json::to_string_pretty(&file)?)?;

        tracing::info!(
            "Emitted {} checkpoint to {}: {}",
            phase,
            path.display(),
            checkpoint.to_cli_string()
        );
        Ok(())
    }

    /// Most recent checkpoint file for `phase`.
    pub async fn read_latest_checkpoint(&self, phase: SyncPhase) -> anyhow::Result<CheckpointFile> {
        let dir = self
            .config
            .checkpoint_dir
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No checkpoint directory configured"))?;
        read_latest_in_dir(dir, phase)
    }

    pub async fn read_checkpoint<C: Checkpoint>(&self, phase: SyncPhase) -> anyhow::Result<C> {
        self.read_latest_checkpoint(phase).await?.parse::<C>()
    }
}

/// Scan `dir` for `checkpoint_<phase>_*.json` and load the newest one.
///
/// File names embed a sortable UTC timestamp, so the lexicographically
/// greatest name is the latest checkpoint.
fn read_latest_in_dir(dir: &Path, phase: SyncPhase) -> anyhow::Result<CheckpointFile> {
    let prefix = format!("checkpoint_{}_", phase.as_str());
    let latest = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(&prefix) && name.ends_with(".json"))
                .unwrap_or(false)
        })
        .max()
        .ok_or_else(|| anyhow::anyhow!("No checkpoint found for phase: {phase}"))?;

    let content = std::fs::read_to_string(latest)?;
    Ok(serde_json::from_str(&content)?)
}
