//! Unit tests for the checkpoint crate.

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::{Checkpoint, CheckpointConfig, CheckpointFile, SyncManager, SyncPhase};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct TestPosition {
    file: String,
    offset: u64,
}

impl Checkpoint for TestPosition {
    const DATABASE_TYPE: &'static str = "test";

    fn to_cli_string(&self) -> String {
        format!("{}:{}", self.file, self.offset)
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        let (file, offset) = s
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("Invalid test position: expected 'file:offset'"))?;
        Ok(Self {
            file: file.to_string(),
            offset: offset.parse()?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct OtherPosition {
    lsn: u64,
}

impl Checkpoint for OtherPosition {
    const DATABASE_TYPE: &'static str = "other";

    fn to_cli_string(&self) -> String {
        self.lsn.to_string()
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        Ok(Self { lsn: s.parse()? })
    }
}

fn position(offset: u64) -> TestPosition {
    TestPosition {
        file: "bin.000001".to_string(),
        offset,
    }
}

#[test]
fn test_checkpoint_file_roundtrip() {
    let file = CheckpointFile::new(&position(4), SyncPhase::BackfillEnd).unwrap();
    let json = serde_json::to_string_pretty(&file).unwrap();
    let loaded: CheckpointFile = serde_json::from_str(&json).unwrap();

    assert_eq!(loaded.database_type, "test");
    assert_eq!(loaded.phase, SyncPhase::BackfillEnd);
    assert_eq!(loaded.parse::<TestPosition>().unwrap(), position(4));
}

#[test]
fn test_checkpoint_type_mismatch() {
    let file = CheckpointFile::new(&position(4), SyncPhase::BackfillStart).unwrap();
    let err = file.parse::<OtherPosition>().unwrap_err();
    assert!(err.to_string().contains("type mismatch"));
}

#[test]
fn test_phase_names() {
    assert_eq!(SyncPhase::BackfillStart.as_str(), "backfill_start");
    assert_eq!(SyncPhase::parse("backfill_end").unwrap(), SyncPhase::BackfillEnd);
    assert!(SyncPhase::parse("incremental").is_err());
}

#[test]
fn test_cli_string_roundtrip() {
    let cli = position(1547).to_cli_string();
    assert_eq!(cli, "bin.000001:1547");
    assert_eq!(TestPosition::from_cli_string(&cli).unwrap(), position(1547));
}

#[tokio::test]
async fn test_emit_and_read_per_phase() {
    let dir = TempDir::new().unwrap();
    let manager = SyncManager::new(CheckpointConfig::to_dir(dir.path()));

    manager
        .emit_checkpoint(&position(100), SyncPhase::BackfillStart)
        .await
        .unwrap();
    manager
        .emit_checkpoint(&position(200), SyncPhase::BackfillEnd)
        .await
        .unwrap();

    let start: TestPosition = manager.read_checkpoint(SyncPhase::BackfillStart).await.unwrap();
    let end: TestPosition = manager.read_checkpoint(SyncPhase::BackfillEnd).await.unwrap();
    assert_eq!(start.offset, 100);
    assert_eq!(end.offset, 200);
}

#[tokio::test]
async fn test_latest_checkpoint_wins() {
    let dir = TempDir::new().unwrap();
    let manager = SyncManager::new(CheckpointConfig::to_dir(dir.path()));

    for offset in [10, 20, 30] {
        manager
            .emit_checkpoint(&position(offset), SyncPhase::BackfillStart)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let latest: TestPosition = manager.read_checkpoint(SyncPhase::BackfillStart).await.unwrap();
    assert_eq!(latest.offset, 30);
}

#[tokio::test]
async fn test_disabled_emission_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let manager = SyncManager::new(CheckpointConfig {
        emit_checkpoints: false,
        checkpoint_dir: Some(dir.path().to_path_buf()),
    });
    assert!(!manager.config().should_emit_checkpoints());

    manager
        .emit_checkpoint(&position(1), SyncPhase::BackfillStart)
        .await
        .unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert!(manager.read_latest_checkpoint(SyncPhase::BackfillStart).await.is_err());
}

#[tokio::test]
async fn test_missing_directory_is_an_error() {
    let manager = SyncManager::new(CheckpointConfig {
        emit_checkpoints: true,
        checkpoint_dir: None,
    });
    assert!(manager
        .emit_checkpoint(&position(1), SyncPhase::BackfillStart)
        .await
        .is_err());
}
