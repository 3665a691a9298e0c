//! Ingestion error types

use crate::storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while ingesting CSV exports
///
/// `Path` aborts a whole run. Every other variant is scoped to a single
/// file and ends up as an entry in the `IngestReport`.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Data directory missing or unreadable
    #[error("Cannot read data directory {path:?}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV structure (bad quoting, invalid UTF-8, ...)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File could not be opened or read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File ended before the metadata row
    #[error("File is empty: missing metadata row")]
    MissingMetadataRow,

    /// File ended before the column header row
    #[error("Missing column header row after metadata")]
    MissingHeaderRow,

    /// Header row does not contain the mapped columns
    #[error("Missing expected columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    /// Timestamp cell does not match the profile's format
    #[error("Line {line}: time data {value:?} does not match format {format:?}")]
    InvalidTimestamp {
        line: u64,
        value: String,
        format: String,
    },

    /// Glucose value present without a timestamp
    #[error("Line {line}: glucose value present but timestamp is empty")]
    MissingTimestamp { line: u64 },

    /// Bulk insert of the file's records failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Background worker died before reporting
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl IngestError {
    /// Whether this error aborts the whole run rather than one file
    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestError::Path { .. })
    }
}

/// Result type for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;
