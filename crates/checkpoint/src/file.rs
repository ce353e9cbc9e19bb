//! On-disk checkpoint format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Checkpoint, SyncPhase};

/// A position plus the metadata needed to interpret it.
///
/// ```json
/// {
///     "database_type": "mysql-binlog",
///     "checkpoint": { "file": "mysql-bin.000003", "position": 1547 },
///     "phase": "BackfillStart",
///     "created_at": "2024-01-01T00:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointFile {
    pub database_type: String,
    pub checkpoint: serde_json::Value,
    pub phase: SyncPhase,
    pub created_at: DateTime<Utc>,
}

impl CheckpointFile {
    pub fn new<C: Checkpoint>(checkpoint: &C, phase: SyncPhase) -> anyhow::Result<Self> {
        Ok(Self {
            database_type: C::DATABASE_TYPE.to_string(),
            checkpoint: serde_json::to_value(checkpoint)?,
            phase,
            created_at: Utc::now(),
        })
    }

    /// Parse the stored position, checking that it was written by the same
    /// source type.
    pub fn parse<C: Checkpoint>(&self) -> anyhow::Result<C> {
        if self.database_type != C::DATABASE_TYPE {
            anyhow::bail!(
                "Checkpoint type mismatch: expected '{}', found '{}'",
                C::DATABASE_TYPE,
                self.database_type
            );
        }
        Ok(serde_json::from_value(self.checkpoint.clone())?)
    }
}
