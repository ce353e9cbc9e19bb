//! Phases at which a checkpoint is written.

use serde::{Deserialize, Serialize};

/// Point in the startup sequence a checkpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncPhase {
    /// Written before the first rule starts its backfill. The position is the
    /// one live streaming resumes from.
    BackfillStart,

    /// Written after every rule finished its backfill, just before live
    /// streaming starts.
    BackfillEnd,
}

impl SyncPhase {
    /// Used in checkpoint file names, e.g. `checkpoint_backfill_start_<ts>.json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::BackfillStart => "backfill_start",
            SyncPhase::BackfillEnd => "backfill_end",
        }
    }

    pub fn parse(phase: &str) -> anyhow::Result<Self> {
        match phase {
            "backfill_start" => Ok(SyncPhase::BackfillStart),
            "backfill_end" => Ok(SyncPhase::BackfillEnd),
            other => Err(anyhow::anyhow!("Unknown sync phase: {other}")),
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
