//! Ingest Report
//!
//! Outcome of one ingestion run. Each file produces its own partial report;
//! partials are merged in file order once every worker has finished, so
//! concurrent files never race on shared counters.

use serde::Serialize;

/// A file that failed to ingest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    /// File name (not the full path)
    pub file: String,
    /// Human-readable reason
    pub message: String,
}

/// Summary of an ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    files_processed: usize,
    files_failed: usize,
    records_inserted: usize,
    rows_skipped: usize,
    errors: Vec<FileError>,
}

impl IngestReport {
    /// Partial report for a file that was stored
    pub(crate) fn file_succeeded(records_inserted: usize, rows_skipped: usize) -> Self {
        Self {
            files_processed: 1,
            records_inserted,
            rows_skipped,
            ..Default::default()
        }
    }

    /// Partial report for a file that failed
    pub(crate) fn file_failed(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            files_failed: 1,
            errors: vec![FileError {
                file: file.into(),
                message: message.into(),
            }],
            ..Default::default()
        }
    }

    /// Fold another (partial) report into this one
    ///
    /// Errors from `other` are appended after the existing ones.
    pub fn merge(&mut self, other: IngestReport) {
        self.files_processed += other.files_processed;
        self.files_failed += other.files_failed;
        self.records_inserted += other.records_inserted;
        self.rows_skipped += other.rows_skipped;
        self.errors.extend(other.errors);
    }

    /// Files ingested successfully
    pub fn files_processed(&self) -> usize {
        self.files_processed
    }

    /// Files that failed
    pub fn files_failed(&self) -> usize {
        self.files_failed
    }

    /// Records written to the store
    pub fn records_inserted(&self) -> usize {
        self.records_inserted
    }

    /// Rows dropped for missing values (or bad timestamps in skip mode)
    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }

    /// One entry per failed file, in file order
    pub fn errors(&self) -> &[FileError] {
        &self.errors
    }

    /// True when no file failed
    pub fn is_clean(&self) -> bool {
        self.files_failed == 0
    }
}

impl std::fmt::Display for IngestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} files processed, {} failed, {} records inserted, {} rows skipped",
            self.files_processed, self.files_failed, self.records_inserted, self.rows_skipped
        )
    }
}
