//! CSV Export
//!
//! Writes readings as `user_id,timestamp,value` rows. The writer is
//! incremental: rows can be pushed one by one from a store scan, so an
//! export never needs the whole result set in memory.
//!
//! Timestamps are rendered as RFC 3339 in UTC with a `Z` suffix and
//! fractional seconds only when present (`2024-01-15T08:30:00Z`).

use crate::storage::GlucoseLevel;
use chrono::SecondsFormat;
use serde::Serialize;
use std::io::Write;

/// Header row of every export
pub const CSV_HEADER: [&str; 3] = ["user_id", "timestamp", "value"];

/// File name offered to HTTP clients
pub const EXPORT_FILENAME: &str = "glucose_levels.csv";

/// A row in the CSV output
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    user_id: &'a str,
    timestamp: String,
    value: f64,
}

impl<'a> From<&'a GlucoseLevel> for CsvRow<'a> {
    fn from(level: &'a GlucoseLevel) -> Self {
        CsvRow {
            user_id: &level.user_id,
            timestamp: level.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            value: level.value,
        }
    }
}

/// Incremental CSV writer for readings
///
/// The header is written on construction, so an export with no rows is
/// exactly the header line.
pub struct LevelCsvWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl<W: Write> LevelCsvWriter<W> {
    pub fn new(inner: W) -> csv::Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(CSV_HEADER)?;
        Ok(Self { writer, rows: 0 })
    }

    /// Append one reading
    pub fn write(&mut self, level: &GlucoseLevel) -> csv::Result<()> {
        self.writer.serialize(CsvRow::from(level))?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far (header excluded)
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and hand back the underlying writer
    pub fn finish(self) -> csv::Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }
}

/// Write every reading from `levels` to `out`, in iteration order
pub fn write_csv<'a, W, I>(out: W, levels: I) -> csv::Result<W>
where
    W: Write,
    I: IntoIterator<Item = &'a GlucoseLevel>,
{
    let mut writer = LevelCsvWriter::new(out)?;
    for level in levels {
        writer.write(level)?;
    }
    writer.finish()
}

/// Render readings to an in-memory CSV document
pub fn to_csv_bytes(levels: &[GlucoseLevel]) -> csv::Result<Vec<u8>> {
    write_csv(Vec::new(), levels)
}
