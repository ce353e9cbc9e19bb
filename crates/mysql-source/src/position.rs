use serde::{Deserialize, Serialize};

/// A binlog file name and byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinlogPosition {
    pub file: String,
    pub position: u32,
}

impl BinlogPosition {
    pub fn new(file: impl Into<String>, position: u32) -> Self {
        Self {
            file: file.into(),
            position,
        }
    }
}

impl std::fmt::Display for BinlogPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.position)
    }
}

impl checkpoint::Checkpoint for BinlogPosition {
    const DATABASE_TYPE: &'static str = "mysql-binlog";

    fn to_cli_string(&self) -> String {
        self.to_string()
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        let (file, position) = s.rsplit_once(':').ok_or_else(|| {
            anyhow::anyhow!("Invalid binlog position '{s}': expected 'file:position'")
        })?;
        if file.is_empty() {
            anyhow::bail!("Invalid binlog position '{s}': empty file name");
        }
        let position = position
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("Invalid binlog offset in '{s}': {e}"))?;
        Ok(Self::new(file, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkpoint::{Checkpoint, CheckpointConfig, CheckpointFile, SyncManager, SyncPhase};
    use tempfile::TempDir;

    #[test]
    fn test_cli_string_roundtrip() {
        let position = BinlogPosition::new("mysql-bin.000003", 1547);
        assert_eq!(position.to_cli_string(), "mysql-bin.000003:1547");
        assert_eq!(
            BinlogPosition::from_cli_string("mysql-bin.000003:1547").unwrap(),
            position
        );
        assert!(BinlogPosition::from_cli_string("mysql-bin.000003").is_err());
        assert!(BinlogPosition::from_cli_string(":4").is_err());
        assert!(BinlogPosition::from_cli_string("bin:-1").is_err());
    }

    #[test]
    fn test_checkpoint_file() {
        let position = BinlogPosition::new("mysql-bin.000001", 4);
        let file = CheckpointFile::new(&position, SyncPhase::BackfillStart).unwrap();
        assert_eq!(file.database_type, "mysql-binlog");
        assert_eq!(file.parse::<BinlogPosition>().unwrap(), position);
    }

    #[tokio::test]
    async fn test_emit_and_read_back() {
        let dir = TempDir::new().unwrap();
        let manager = SyncManager::new(CheckpointConfig::to_dir(dir.path()));
        let position = BinlogPosition::new("mysql-bin.000009", 88);

        manager
            .emit_checkpoint(&position, SyncPhase::BackfillEnd)
            .await
            .unwrap();
        let loaded: BinlogPosition = manager.read_checkpoint(SyncPhase::BackfillEnd).await.unwrap();
        assert_eq!(loaded, position);
    }
}
