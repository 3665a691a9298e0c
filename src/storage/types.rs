//! Core data types for the glucose record store
//!
//! - `GlucoseLevel`: a persisted reading with its surrogate identifier
//! - `NewGlucoseLevel`: a reading that has not been stored yet
//! - `LevelFilter`: the filter/limit applied when reading records back

use crate::storage::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a user identifier
pub const MAX_USER_ID_LEN: usize = 255;

/// A single stored glucose reading
///
/// Natural ordering is by `timestamp` ascending, ties broken by `id`
/// (insertion order).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlucoseLevel {
    /// Surrogate identifier, assigned monotonically by the store
    pub id: i64,
    /// Owner of the reading
    pub user_id: String,
    /// When the reading was taken
    pub timestamp: DateTime<Utc>,
    /// Glucose value as exported by the device
    pub value: f64,
}

impl std::fmt::Display for GlucoseLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "User: {} - Glucose: {} at {}",
            self.user_id,
            self.value,
            self.timestamp.to_rfc3339()
        )
    }
}

/// A reading waiting to be inserted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewGlucoseLevel {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl NewGlucoseLevel {
    pub fn new(user_id: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp,
            value,
        }
    }

    /// Check the invariants the store relies on
    pub fn validate(&self) -> StorageResult<()> {
        if self.user_id.is_empty() {
            return Err(StorageError::InvalidRecord(
                "user_id cannot be empty".to_string(),
            ));
        }
        if self.user_id.chars().count() > MAX_USER_ID_LEN {
            return Err(StorageError::InvalidRecord(format!(
                "user_id exceeds maximum length of {} characters",
                MAX_USER_ID_LEN
            )));
        }
        if !self.value.is_finite() {
            return Err(StorageError::InvalidRecord(format!(
                "value must be a finite number, got {}",
                self.value
            )));
        }
        Ok(())
    }
}

/// Filter applied when reading records
///
/// Bounds are inclusive. `None` means "no restriction".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelFilter {
    pub user_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub stop: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl LevelFilter {
    /// Filter matching every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Builder method: restrict to one user
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Builder method: inclusive lower bound
    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Builder method: inclusive upper bound
    pub fn stop(mut self, stop: DateTime<Utc>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Builder method: truncate the ordered result
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check if a record passes this filter (ignores `limit`)
    pub fn matches(&self, level: &GlucoseLevel) -> bool {
        if let Some(ref user_id) = self.user_id {
            if &level.user_id != user_id {
                return false;
            }
        }
        if let Some(start) = self.start {
            if level.timestamp < start {
                return false;
            }
        }
        if let Some(stop) = self.stop {
            if level.timestamp > stop {
                return false;
            }
        }
        true
    }
}

/// Convert an instant to the stored representation (microseconds since epoch)
pub fn to_micros(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

/// Convert the stored representation back to an instant
pub fn from_micros(micros: i64) -> Option<DateTime<Utc>> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos)
}
