//! CSV Ingestion
//!
//! Loads per-user device exports from a directory into the record store.
//!
//! - **mapping**: Vendor column profiles (`ColumnMap`, `VendorProfile`)
//! - **timestamp**: Zone handling for naive export timestamps
//! - **report**: `IngestReport` returned by every run
//! - **error**: Error types
//!
//! # Pipeline
//!
//! ```text
//! data dir → *.csv (sorted) → per file, bounded parallel:
//!     skip metadata row → resolve headers → parse rows → drop empty values
//!     → bulk insert (one transaction) → partial report
//! partial reports → merged in file order → IngestReport
//! ```
//!
//! A failing file never stops the run; only an unreadable directory does.

pub mod error;
pub mod mapping;
pub mod report;
pub mod timestamp;

pub use error::{IngestError, IngestResult};
pub use mapping::{CanonicalField, ColumnMap, ResolvedColumns, VendorProfile};
pub use report::{FileError, IngestReport};
pub use timestamp::Timezone;

use crate::storage::{LevelStore, NewGlucoseLevel};
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What to do with a row whose timestamp cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadTimestampPolicy {
    /// Abort the file and report it
    #[default]
    FailFile,
    /// Skip the row and keep going
    SkipRow,
}

/// Ingestion settings
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Default directory for batch loads
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Recognised file extensions (case-insensitive)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Rows preceding the column header row
    #[serde(default = "default_metadata_rows")]
    pub metadata_rows: usize,

    /// Zone of the naive export timestamps
    #[serde(default)]
    pub timezone: Timezone,

    /// Files ingested concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub on_bad_timestamp: BadTimestampPolicy,

    /// Extra vendor profiles, tried before the built-in ones
    #[serde(default)]
    pub profiles: Vec<VendorProfile>,
}

fn default_extensions() -> Vec<String> {
    vec!["csv".to_string()]
}

fn default_metadata_rows() -> usize {
    1
}

fn default_workers() -> usize {
    4
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            extensions: default_extensions(),
            metadata_rows: default_metadata_rows(),
            timezone: Timezone::default(),
            workers: default_workers(),
            on_bad_timestamp: BadTimestampPolicy::default(),
            profiles: Vec::new(),
        }
    }
}

/// Records parsed from one export, not yet stored
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub user_id: String,
    /// Name of the vendor profile that matched the header row
    pub profile: String,
    pub levels: Vec<NewGlucoseLevel>,
    /// Data rows seen (after metadata and header)
    pub rows_read: usize,
    /// Data rows dropped
    pub rows_skipped: usize,
}

/// Directory-level CSV ingestor
#[derive(Debug, Clone)]
pub struct CsvIngestor {
    config: IngestConfig,
    columns: ColumnMap,
}

impl Default for CsvIngestor {
    fn default() -> Self {
        Self::new(IngestConfig::default())
    }
}

impl CsvIngestor {
    pub fn new(config: IngestConfig) -> Self {
        let columns = ColumnMap::from_profiles(config.profiles.clone());
        Self { config, columns }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Recognised files in `dir`, sorted by name
    pub fn list_files(&self, dir: &Path) -> IngestResult<Vec<PathBuf>> {
        let path_error = |source| IngestError::Path {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(path_error)? {
            let path = entry.map_err(path_error)?.path();
            if path.is_file() && self.is_recognized(&path) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    fn is_recognized(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.config
                    .extensions
                    .iter()
                    .any(|known| known.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Parse one export; the user id is the file stem
    pub fn parse_file(&self, path: &Path) -> IngestResult<ParsedFile> {
        let user_id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = std::fs::File::open(path)?;
        self.parse_reader(&user_id, file)
    }

    /// Parse an export from any reader
    pub fn parse_reader<R: Read>(&self, user_id: &str, reader: R) -> IngestResult<ParsedFile> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut records = reader.records();

        for _ in 0..self.config.metadata_rows {
            records.next().ok_or(IngestError::MissingMetadataRow)??;
        }

        let headers = records.next().ok_or(IngestError::MissingHeaderRow)??;
        let (profile, columns) = self.columns.resolve(&headers)?;

        let mut levels = Vec::new();
        let mut rows_read = 0;
        let mut rows_skipped = 0;

        for result in records {
            let record = result?;
            rows_read += 1;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let ts_text = record.get(columns.timestamp).unwrap_or("").trim();
            let value_text = record.get(columns.glucose_value).unwrap_or("").trim();

            // Every non-empty timestamp must parse, even on rows that are dropped below
            let timestamp = if ts_text.is_empty() {
                None
            } else {
                match self.config.timezone.parse(ts_text, &profile.timestamp_format) {
                    Some(ts) => Some(ts),
                    None => {
                        let err = IngestError::InvalidTimestamp {
                            line,
                            value: ts_text.to_string(),
                            format: profile.timestamp_format.clone(),
                        };
                        self.on_bad_timestamp(err)?;
                        rows_skipped += 1;
                        continue;
                    }
                }
            };

            let Some(value) = parse_value(value_text) else {
                rows_skipped += 1;
                continue;
            };

            let Some(timestamp) = timestamp else {
                self.on_bad_timestamp(IngestError::MissingTimestamp { line })?;
                rows_skipped += 1;
                continue;
            };

            levels.push(NewGlucoseLevel::new(user_id, timestamp, value));
        }

        Ok(ParsedFile {
            user_id: user_id.to_string(),
            profile: profile.name.clone(),
            levels,
            rows_read,
            rows_skipped,
        })
    }

    /// Apply the bad-timestamp policy: `Err` fails the file, `Ok` skips the row
    fn on_bad_timestamp(&self, err: IngestError) -> IngestResult<()> {
        match self.config.on_bad_timestamp {
            BadTimestampPolicy::FailFile => Err(err),
            BadTimestampPolicy::SkipRow => {
                tracing::debug!(error = %err, "Skipping row");
                Ok(())
            }
        }
    }

    /// Parse and store one file, reporting instead of failing
    pub fn ingest_file(&self, store: &LevelStore, path: &Path) -> IngestReport {
        let name = display_name(path);

        let outcome = self.parse_file(path).and_then(|parsed| {
            let stored = store.insert_batch(&parsed.levels)?;
            Ok((parsed, stored.len()))
        });

        match outcome {
            Ok((parsed, inserted)) => {
                tracing::info!(
                    file = %name,
                    user_id = %parsed.user_id,
                    profile = %parsed.profile,
                    records = inserted,
                    skipped = parsed.rows_skipped,
                    "Ingested file"
                );
                IngestReport::file_succeeded(inserted, parsed.rows_skipped)
            }
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "Error processing file");
                IngestReport::file_failed(name, e.to_string())
            }
        }
    }

    /// Ingest every recognised file in `dir`
    ///
    /// Files run on the blocking pool, at most `workers` at a time. Fails only
    /// if the directory itself cannot be read.
    pub async fn ingest_dir(
        self: &Arc<Self>,
        store: Arc<LevelStore>,
        dir: &Path,
    ) -> IngestResult<IngestReport> {
        let files = self.list_files(dir)?;
        let workers = self.config.workers.max(1);

        tracing::info!(
            dir = %dir.display(),
            files = files.len(),
            workers,
            "Starting ingestion"
        );

        let report = stream::iter(files)
            .map(|path| {
                let ingestor = Arc::clone(self);
                let store = Arc::clone(&store);
                async move {
                    let name = display_name(&path);
                    tokio::task::spawn_blocking(move || ingestor.ingest_file(&store, &path))
                        .await
                        .unwrap_or_else(|e| {
                            let err = IngestError::Worker(e.to_string());
                            tracing::error!(file = %name, error = %err, "Ingest worker failed");
                            IngestReport::file_failed(name, err.to_string())
                        })
                }
            })
            .buffered(workers)
            .fold(IngestReport::default(), |mut acc, partial| async move {
                acc.merge(partial);
                acc
            })
            .await;

        tracing::info!(%report, "Ingestion finished");
        Ok(report)
    }
}

/// Parse a glucose cell; empty, non-numeric and non-finite cells are gaps
fn parse_value(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
