//! Timestamp handling for device exports
//!
//! Device exports carry naive wall-clock times. They are read with the
//! profile's format, attached to the configured zone and normalised to UTC.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::str::FromStr;

/// Zone used to interpret naive timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Timezone {
    #[default]
    Utc,
    /// The host's local zone, including its DST rules
    Local,
    /// A fixed offset such as `+01:00`
    Fixed(FixedOffset),
}

impl Timezone {
    /// Attach this zone to a wall-clock time and convert to UTC
    ///
    /// Ambiguous local times (DST fall-back) resolve to the earlier instant.
    /// Non-existent local times (DST spring-forward gap) yield `None`.
    pub fn to_utc(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Timezone::Utc => Some(naive.and_utc()),
            Timezone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            Timezone::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    /// Parse `text` with `format` in this zone
    pub fn parse(&self, text: &str, format: &str) -> Option<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(text.trim(), format).ok()?;
        self.to_utc(naive)
    }
}

impl FromStr for Timezone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "utc" | "z" => Ok(Timezone::Utc),
            "local" => Ok(Timezone::Local),
            _ => trimmed.parse::<FixedOffset>().map(Timezone::Fixed).map_err(|_| {
                format!(
                    "Invalid timezone '{}': use \"utc\", \"local\" or an offset like \"+01:00\"",
                    s
                )
            }),
        }
    }
}

impl TryFrom<String> for Timezone {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::fmt::Display for Timezone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timezone::Utc => write!(f, "utc"),
            Timezone::Local => write!(f, "local"),
            Timezone::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}
