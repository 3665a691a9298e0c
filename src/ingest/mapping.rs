//! Column mapping registry
//!
//! Vendor exports name their columns differently (and in different
//! languages). A `VendorProfile` maps source headers onto the canonical
//! fields the ingestor understands; a `ColumnMap` holds the registered
//! profiles and picks the first one that fits a file's header row.

use crate::ingest::error::IngestError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default timestamp layout of device exports: `day-month-year hour:minute`
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Fields every profile must resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    /// Device timestamp of the reading
    Timestamp,
    /// Glucose value column
    GlucoseValue,
}

impl CanonicalField {
    /// Get all canonical fields for iteration
    pub fn all() -> &'static [CanonicalField] {
        &[CanonicalField::Timestamp, CanonicalField::GlucoseValue]
    }

    /// The canonical column name
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::Timestamp => "timestamp",
            CanonicalField::GlucoseValue => "glucose_value",
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Header-to-field mapping for one CSV vendor layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorProfile {
    /// Profile name, used in logs
    pub name: String,
    /// chrono format string for the timestamp column
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    /// Source header → canonical field
    #[serde(default)]
    pub columns: BTreeMap<String, CanonicalField>,
}

fn default_timestamp_format() -> String {
    DEFAULT_TIMESTAMP_FORMAT.to_string()
}

/// Column positions resolved from a header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub timestamp: usize,
    pub glucose_value: usize,
}

impl VendorProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp_format: default_timestamp_format(),
            columns: BTreeMap::new(),
        }
    }

    /// Builder method: map a source header to a canonical field
    pub fn column(mut self, source: impl Into<String>, field: CanonicalField) -> Self {
        self.columns.insert(source.into(), field);
        self
    }

    /// Builder method: set the timestamp format
    pub fn timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    /// LibreView export with German headers
    pub fn libreview_de() -> Self {
        Self::new("libreview-de")
            .column("Gerätezeitstempel", CanonicalField::Timestamp)
            .column("Glukosewert-Verlauf mg/dL", CanonicalField::GlucoseValue)
    }

    /// Which canonical field a header maps to, if any
    ///
    /// A header that already carries the canonical name maps to itself.
    fn field_for(&self, header: &str) -> Option<CanonicalField> {
        if let Some(field) = self.columns.get(header) {
            return Some(*field);
        }
        CanonicalField::all()
            .iter()
            .copied()
            .find(|field| field.name() == header)
    }

    /// Locate the canonical columns in a header row
    ///
    /// On failure returns the fields that could not be found.
    pub fn resolve(&self, headers: &csv::StringRecord) -> Result<ResolvedColumns, Vec<CanonicalField>> {
        let mut timestamp = None;
        let mut glucose_value = None;

        for (idx, header) in headers.iter().enumerate() {
            let header = normalize_header(header);
            match self.field_for(header) {
                Some(CanonicalField::Timestamp) if timestamp.is_none() => timestamp = Some(idx),
                Some(CanonicalField::GlucoseValue) if glucose_value.is_none() => {
                    glucose_value = Some(idx)
                }
                _ => {}
            }
        }

        match (timestamp, glucose_value) {
            (Some(timestamp), Some(glucose_value)) => Ok(ResolvedColumns {
                timestamp,
                glucose_value,
            }),
            (ts, gv) => {
                let mut missing = Vec::new();
                if ts.is_none() {
                    missing.push(CanonicalField::Timestamp);
                }
                if gv.is_none() {
                    missing.push(CanonicalField::GlucoseValue);
                }
                Err(missing)
            }
        }
    }
}

/// Trim whitespace and a leading byte-order mark
fn normalize_header(header: &str) -> &str {
    header.trim_start_matches('\u{feff}').trim()
}

/// Registered vendor profiles, tried in order
#[derive(Debug, Clone)]
pub struct ColumnMap {
    profiles: Vec<VendorProfile>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ColumnMap {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            profiles: Vec::new(),
        }
    }

    /// Registry holding only the built-in profiles
    pub fn with_defaults() -> Self {
        let mut map = Self::new();
        map.register(VendorProfile::libreview_de());
        map
    }

    /// Configured profiles first, built-in profiles after them
    pub fn from_profiles(configured: impl IntoIterator<Item = VendorProfile>) -> Self {
        let mut map = Self::new();
        for profile in configured {
            map.register(profile);
        }
        for builtin in Self::with_defaults().profiles {
            if !map.profiles.iter().any(|p| p.name == builtin.name) {
                map.register(builtin);
            }
        }
        map
    }

    /// Add a profile at the end of the search order
    pub fn register(&mut self, profile: VendorProfile) {
        self.profiles.push(profile);
    }

    pub fn profiles(&self) -> &[VendorProfile] {
        &self.profiles
    }

    /// Pick the first profile that resolves every canonical field
    pub fn resolve(
        &self,
        headers: &csv::StringRecord,
    ) -> Result<(&VendorProfile, ResolvedColumns), IngestError> {
        let mut closest: Option<Vec<CanonicalField>> = None;

        for profile in &self.profiles {
            match profile.resolve(headers) {
                Ok(columns) => return Ok((profile, columns)),
                Err(missing) => {
                    if closest.as_ref().map_or(true, |c| missing.len() < c.len()) {
                        closest = Some(missing);
                    }
                }
            }
        }

        let missing = closest.unwrap_or_else(|| CanonicalField::all().to_vec());
        Err(IngestError::MissingColumns {
            missing: missing.iter().map(|f| f.name().to_string()).collect(),
        })
    }
}
