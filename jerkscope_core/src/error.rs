//! Error types for the JerkScope ETL core.
//!
//! Only [`DecodeError`] is recoverable: the pipeline logs it, drops the
//! offending line and keeps reading. Everything else ends the run.

use std::path::PathBuf;
use thiserror::Error;

/// A single input line could not be decoded into a frame.
#[derive(Debug, Error)]
#[error("Frame decode error: {0}")]
pub struct DecodeError(#[from] pub serde_json::Error);

/// Fatal failures while consuming the input stream.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The underlying reader failed (not a per-line parse problem)
    #[error("Failed to read input stream at line {line}: {source}")]
    StreamRead {
        line: u64,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal failures while persisting the record table.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Output artifact could not be created
    #[error("Failed to create output {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Write or flush to an open artifact failed
    #[error("Output I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parquet encoder rejected the batch
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Record serialization failed (JSON Lines sink)
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SinkError {
    /// Creates a file-creation error for `path`.
    pub fn create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Create {
            path: path.into(),
            source,
        }
    }
}
