//! Sink consumer abstraction.
//!
//! This crate defines the [`Consumer`] trait that every delivery target
//! implements, plus the pieces shared by keyed sinks:
//!
//! - [`KeyResolver`] picks the record id of an event.
//! - [`RecordWriter`] and [`apply_batch`] implement the two-phase batch policy
//!   (one bulk removal, then one bulk upsert) once for every keyed sink.
//! - [`LogSink`] writes events to the log and is the fallback target.
//!
//! Key-value and document sinks live in their own crates and only provide a
//! [`RecordWriter`].

mod batch;
mod error;
mod keys;
mod log;
mod traits;

pub use batch::{apply_batch, RecordWriter};
pub use error::{Result, SinkError};
pub use keys::KeyResolver;
pub use log::LogSink;
pub use traits::Consumer;
