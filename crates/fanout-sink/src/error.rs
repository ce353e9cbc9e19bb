use thiserror::Error;
use transform::TransformError;

/// Errors raised while delivering events to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to encode record: {0}")]
    Encode(#[from] TransformError),

    /// The backing store rejected or failed a request
    #[error("{sink} request failed: {message}")]
    Backend { sink: &'static str, message: String },

    /// The sink has been shut down and no longer accepts records
    #[error("{0} sink is closed")]
    Closed(&'static str),
}

impl SinkError {
    pub fn backend(sink: &'static str, err: impl std::fmt::Display) -> Self {
        SinkError::Backend {
            sink,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SinkError>;
