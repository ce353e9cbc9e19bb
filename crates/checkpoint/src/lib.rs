//! Replication position checkpoints.
//!
//! The router captures its replication position once at startup. When asked
//! to, it writes that position to a checkpoint directory before backfill
//! begins and again once backfill is done, so an operator can see where live
//! streaming started.
//!
//! - [`Checkpoint`] is implemented by source-specific position types.
//! - [`CheckpointFile`] wraps a position with its phase and creation time.
//! - [`SyncManager`] writes and reads checkpoint files on disk.

mod file;
mod manager;
mod phase;

#[cfg(test)]
mod tests;

pub use file::CheckpointFile;
pub use manager::{CheckpointConfig, SyncManager};
pub use phase::SyncPhase;

/// A source-specific replication position.
///
/// # Example
///
/// ```rust
/// use checkpoint::Checkpoint;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct LogOffset {
///     pub offset: u64,
/// }
///
/// impl Checkpoint for LogOffset {
///     const DATABASE_TYPE: &'static str = "log-offset";
///
///     fn to_cli_string(&self) -> String {
///         self.offset.to_string()
///     }
///
///     fn from_cli_string(s: &str) -> anyhow::Result<Self> {
///         Ok(Self { offset: s.parse()? })
///     }
/// }
/// ```
pub trait Checkpoint: serde::Serialize + for<'de> serde::Deserialize<'de> + Clone {
    /// Source type identifier stored in checkpoint files and checked on load.
    const DATABASE_TYPE: &'static str;

    /// Human-readable form used in logs and on the command line.
    fn to_cli_string(&self) -> String;

    /// Parse the form produced by `to_cli_string()`.
    fn from_cli_string(s: &str) -> anyhow::Result<Self>
    where
        Self: Sized;
}
