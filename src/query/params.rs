//! Lenient query parameters
//!
//! List and export requests carry their filters as free-form strings.
//! Anything that does not parse is treated as absent rather than rejected.

use crate::storage::LevelFilter;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

/// Raw `?user_id=&start=&stop=&limit=` parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub stop: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

impl ListParams {
    /// Collect parameters from raw query pairs
    ///
    /// A repeated key keeps its last value; unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = ListParams::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "user_id" => &mut params.user_id,
                "start" => &mut params.start,
                "stop" => &mut params.stop,
                "limit" => &mut params.limit,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        params
    }

    /// Build a storage filter, resolving relative times against the current time
    pub fn to_filter(&self) -> LevelFilter {
        self.to_filter_at(Utc::now())
    }

    /// Build a storage filter, resolving relative times against `now`
    pub fn to_filter_at(&self, now: DateTime<Utc>) -> LevelFilter {
        LevelFilter {
            user_id: self
                .user_id
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
            start: self.start.as_deref().and_then(|s| parse_instant(s, now)),
            stop: self.stop.as_deref().and_then(|s| parse_instant(s, now)),
            limit: self.limit.as_deref().and_then(parse_limit),
        }
    }
}

/// Parse a non-negative limit; anything else means "unbounded"
pub fn parse_limit(s: &str) -> Option<usize> {
    s.trim().parse::<usize>().ok()
}

/// Parse a time bound
///
/// Accepts RFC 3339, naive ISO date-times (UTC), plain dates (midnight UTC),
/// epoch milliseconds, `now` and `now-<n><h|d|w|m>`.
pub fn parse_instant(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if s.starts_with("now") {
        return parse_relative_time(s, now);
    }

    if let Ok(ms) = s.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms);
    }

    if let Some(dt) = parse_rfc3339(s) {
        return Some(dt);
    }

    // An unencoded '+' in a query string arrives as a space
    if let Some(idx) = s.rfind(' ') {
        if idx > 10 {
            let restored = format!("{}+{}", &s[..idx], &s[idx + 1..]);
            if let Some(dt) = parse_rfc3339(&restored) {
                return Some(dt);
            }
        }
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse relative time like "now-7d"
fn parse_relative_time(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if s == "now" {
        return Some(now);
    }

    let re = regex::Regex::new(r"^now-(\d+)([hdwm])$").ok()?;
    let caps = re.captures(s)?;
    let amount: i64 = caps[1].parse().ok()?;

    let delta = match &caps[2] {
        "h" => Duration::try_hours(amount)?,
        "d" => Duration::try_days(amount)?,
        "w" => Duration::try_weeks(amount)?,
        "m" => Duration::try_days(amount.checked_mul(30)?)?,
        _ => return None,
    };

    now.checked_sub_signed(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_from_pairs_last_value_wins() {
        let params = ListParams::from_pairs([
            ("limit", "1"),
            ("start", "bogus"),
            ("page", "3"),
            ("limit", "2"),
            ("start", "2024-01-15"),
        ]);

        assert_eq!(params.limit.as_deref(), Some("2"));
        assert_eq!(params.start.as_deref(), Some("2024-01-15"));
        assert_eq!(params.user_id, None);

        let filter = params.to_filter_at(now());
        assert_eq!(filter.limit, Some(2));
        assert_eq!(filter.start, Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_parse_instant_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();

        assert_eq!(parse_instant("2024-01-15T10:30:00Z", now()), Some(expected));
        assert_eq!(parse_instant("2024-01-15T11:30:00+01:00", now()), Some(expected));
        assert_eq!(parse_instant("2024-01-15T11:30:00 01:00", now()), Some(expected));
        assert_eq!(parse_instant("2024-01-15T10:30:00", now()), Some(expected));
        assert_eq!(parse_instant("2024-01-15 10:30", now()), Some(expected));
        assert_eq!(
            parse_instant(&expected.timestamp_millis().to_string(), now()),
            Some(expected)
        );
        assert_eq!(
            parse_instant("2024-01-15", now()),
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_relative_time() {
        assert_eq!(parse_instant("now", now()), Some(now()));
        assert_eq!(
            parse_instant("now-7d", now()),
            Some(now() - Duration::days(7))
        );
        assert_eq!(
            parse_instant("now-24h", now()),
            Some(now() - Duration::hours(24))
        );
        assert_eq!(parse_instant("now-3x", now()), None);
    }

    #[test]
    fn test_invalid_bounds_are_absent() {
        assert_eq!(parse_instant("", now()), None);
        assert_eq!(parse_instant("yesterday", now()), None);
        assert_eq!(parse_instant("2024-13-45", now()), None);
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit("3"), Some(3));
        assert_eq!(parse_limit(" 0 "), Some(0));
        assert_eq!(parse_limit("-1"), None);
        assert_eq!(parse_limit("ten"), None);
    }

    #[test]
    fn test_to_filter() {
        let params = ListParams {
            user_id: Some("alice".to_string()),
            start: Some("2024-01-01".to_string()),
            stop: Some("not-a-date".to_string()),
            limit: Some("abc".to_string()),
        };
        let filter = params.to_filter_at(now());

        assert_eq!(filter.user_id.as_deref(), Some("alice"));
        assert!(filter.start.is_some());
        assert!(filter.stop.is_none());
        assert!(filter.limit.is_none());
    }

    #[test]
    fn test_empty_user_id_is_no_restriction() {
        let params = ListParams {
            user_id: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(params.to_filter_at(now()), LevelFilter::all());
    }
}
