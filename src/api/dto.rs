//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::api::error::{ApiError, ApiResult, ValidationErrors};
use crate::storage::types::MAX_USER_ID_LEN;
use crate::storage::{GlucoseLevel, NewGlucoseLevel};

// ============================================
// UPLOAD DTOs
// ============================================

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";
const NOT_STRING: &str = "Not a valid string.";
const BAD_NUMBER: &str = "A valid number is required.";
const BAD_DATETIME: &str = "Datetime has wrong format. Use one of these formats instead: \
     YYYY-MM-DDThh:mm[:ss[.uuuuuu]][+HH:MM|-HH:MM|Z].";

/// Naive date-time layouts accepted on upload, interpreted as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Validated body of `POST /upload/`
///
/// Remembers whether the client sent one object or an array so the
/// response mirrors the request shape.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadRequest {
    One(NewGlucoseLevel),
    Many(Vec<NewGlucoseLevel>),
}

impl UploadRequest {
    /// Parse and validate a raw JSON body
    ///
    /// An array is all-or-nothing: every item is checked and the errors of
    /// all invalid items are reported together.
    pub fn from_json(body: &[u8]) -> ApiResult<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("JSON parse error - {}", e)))?;

        match value {
            Value::Object(item) => {
                let mut errors = ValidationErrors::new();
                let level = validate_item(&item, "", &mut errors);
                errors.into_result()?;
                level
                    .map(UploadRequest::One)
                    .ok_or_else(|| ApiError::Internal("validated upload lost its record".into()))
            }
            Value::Array(items) => {
                let mut errors = ValidationErrors::new();
                if items.is_empty() {
                    errors.add("non_field_errors", "This list may not be empty.");
                }

                let mut levels = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let prefix = format!("[{}].", index);
                    match item {
                        Value::Object(item) => {
                            if let Some(level) = validate_item(item, &prefix, &mut errors) {
                                levels.push(level);
                            }
                        }
                        other => errors.add(
                            format!("[{}]", index),
                            invalid_data_message(other),
                        ),
                    }
                }

                errors.into_result()?;
                Ok(UploadRequest::Many(levels))
            }
            other => {
                let mut errors = ValidationErrors::new();
                errors.add("non_field_errors", invalid_data_message(&other));
                Err(ApiError::Validation(errors))
            }
        }
    }

    /// Records to insert, in request order
    pub fn levels(&self) -> &[NewGlucoseLevel] {
        match self {
            UploadRequest::One(level) => std::slice::from_ref(level),
            UploadRequest::Many(levels) => levels,
        }
    }

    /// Shape the stored records like the request
    pub fn respond(&self, mut created: Vec<GlucoseLevel>) -> ApiResult<UploadResponse> {
        match self {
            UploadRequest::One(_) => created
                .pop()
                .map(UploadResponse::One)
                .ok_or_else(|| ApiError::Internal("store returned no record".into())),
            UploadRequest::Many(_) => Ok(UploadResponse::Many(created)),
        }
    }
}

/// Body of a successful upload
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UploadResponse {
    One(GlucoseLevel),
    Many(Vec<GlucoseLevel>),
}

fn invalid_data_message(value: &Value) -> String {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    };
    format!("Invalid data. Expected a dictionary, but got {}.", kind)
}

/// Validate one object, recording messages under `<prefix><field>`
fn validate_item(
    item: &Map<String, Value>,
    prefix: &str,
    errors: &mut ValidationErrors,
) -> Option<NewGlucoseLevel> {
    let user_id = field(item, "user_id", prefix, errors, validate_user_id);
    let timestamp = field(item, "timestamp", prefix, errors, validate_timestamp);
    let value = field(item, "value", prefix, errors, validate_value);

    Some(NewGlucoseLevel::new(user_id?, timestamp?, value?))
}

fn field<T>(
    item: &Map<String, Value>,
    name: &str,
    prefix: &str,
    errors: &mut ValidationErrors,
    validate: fn(&Value) -> Result<T, String>,
) -> Option<T> {
    let result = match item.get(name) {
        None => Err(REQUIRED.to_string()),
        Some(Value::Null) => Err(NOT_NULL.to_string()),
        Some(value) => validate(value),
    };

    match result {
        Ok(v) => Some(v),
        Err(message) => {
            errors.add(format!("{}{}", prefix, name), message);
            None
        }
    }
}

fn validate_user_id(value: &Value) -> Result<String, String> {
    let user_id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(NOT_STRING.to_string()),
    };

    if user_id.is_empty() {
        return Err(NOT_BLANK.to_string());
    }
    if user_id.chars().count() > MAX_USER_ID_LEN {
        return Err(format!(
            "Ensure this field has no more than {} characters.",
            MAX_USER_ID_LEN
        ));
    }
    Ok(user_id)
}

fn validate_timestamp(value: &Value) -> Result<DateTime<Utc>, String> {
    value
        .as_str()
        .and_then(parse_upload_timestamp)
        .ok_or_else(|| BAD_DATETIME.to_string())
}

fn validate_value(value: &Value) -> Result<f64, String> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    number
        .filter(|v| v.is_finite())
        .ok_or_else(|| BAD_NUMBER.to_string())
}

/// Parse an ISO-8601 upload timestamp; values without an offset are UTC
pub fn parse_upload_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|naive| naive.and_utc())
}

// ============================================
// HEALTH DTOs
// ============================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy or unhealthy
    pub status: String,
    /// Storage status
    pub storage: String,
    /// Stored readings, absent when the store is unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<u64>,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// API version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rejected(body: &str) -> ValidationErrors {
        match UploadRequest::from_json(body.as_bytes()) {
            Err(ApiError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_single_object() {
        let request = UploadRequest::from_json(
            br#"{"user_id": "alice", "timestamp": "2024-01-15T08:30:00Z", "value": 120}"#,
        )
        .unwrap();

        let expected = NewGlucoseLevel::new(
            "alice",
            Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap(),
            120.0,
        );
        assert_eq!(request, UploadRequest::One(expected));
    }

    #[test]
    fn test_array_keeps_order() {
        let request = UploadRequest::from_json(
            br#"[
                {"user_id": "b", "timestamp": "2024-01-15T09:00:00+01:00", "value": "98.5"},
                {"user_id": "a", "timestamp": "2024-01-15 08:00:00", "value": 101.0}
            ]"#,
        )
        .unwrap();

        let levels = request.levels();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].user_id, "b");
        assert_eq!(levels[0].value, 98.5);
        assert_eq!(levels[0].timestamp, levels[1].timestamp);
    }

    #[test]
    fn test_missing_and_invalid_fields() {
        let errors = rejected(r#"{"timestamp": "yesterday", "value": "abc"}"#);

        assert_eq!(errors.get("user_id").unwrap(), [REQUIRED.to_string()]);
        assert_eq!(errors.get("timestamp").unwrap(), [BAD_DATETIME.to_string()]);
        assert_eq!(errors.get("value").unwrap(), [BAD_NUMBER.to_string()]);
    }

    #[test]
    fn test_user_id_rules() {
        let errors = rejected(r#"{"user_id": "  ", "timestamp": "2024-01-15T08:30:00Z", "value": 1}"#);
        assert_eq!(errors.get("user_id").unwrap(), [NOT_BLANK.to_string()]);

        let long = "x".repeat(MAX_USER_ID_LEN + 1);
        let body = format!(
            r#"{{"user_id": "{}", "timestamp": "2024-01-15T08:30:00Z", "value": 1}}"#,
            long
        );
        assert!(rejected(&body).get("user_id").is_some());

        let errors = rejected(r#"{"user_id": null, "timestamp": "2024-01-15T08:30:00Z", "value": 1}"#);
        assert_eq!(errors.get("user_id").unwrap(), [NOT_NULL.to_string()]);
    }

    #[test]
    fn test_array_errors_are_indexed() {
        let errors = rejected(
            r#"[
                {"user_id": "a", "timestamp": "2024-01-15T08:30:00Z", "value": 1},
                {"user_id": "a", "timestamp": "2024-01-15T08:30:00Z"},
                5
            ]"#,
        );

        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["[1].value", "[2]"]);
    }

    #[test]
    fn test_empty_array_rejected() {
        assert!(rejected("[]").get("non_field_errors").is_some());
    }

    #[test]
    fn test_scalar_body_rejected() {
        let errors = rejected("42");
        assert_eq!(
            errors.get("non_field_errors").unwrap(),
            ["Invalid data. Expected a dictionary, but got int.".to_string()]
        );
    }

    #[test]
    fn test_malformed_json_is_bad_request() {
        assert!(matches!(
            UploadRequest::from_json(b"{not json"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_non_finite_value_rejected() {
        let errors = rejected(r#"{"user_id": "a", "timestamp": "2024-01-15T08:30:00Z", "value": "NaN"}"#);
        assert!(errors.get("value").is_some());
    }

    #[test]
    fn test_parse_upload_timestamp() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap();

        assert_eq!(parse_upload_timestamp("2024-01-15T08:30:00Z"), Some(expected));
        assert_eq!(parse_upload_timestamp("2024-01-15T09:30:00+01:00"), Some(expected));
        assert_eq!(parse_upload_timestamp("2024-01-15 09:30:00+01:00"), Some(expected));
        assert_eq!(parse_upload_timestamp("2024-01-15T08:30"), Some(expected));
        assert_eq!(parse_upload_timestamp("2024-01-15 08:30:00"), Some(expected));
        assert_eq!(parse_upload_timestamp("15-01-2024 08:30"), None);
        assert_eq!(parse_upload_timestamp("2024-01-15"), None);
    }

    #[test]
    fn test_response_mirrors_request_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap();
        let stored = GlucoseLevel {
            id: 7,
            user_id: "alice".into(),
            timestamp: ts,
            value: 120.0,
        };

        let one = UploadRequest::One(NewGlucoseLevel::new("alice", ts, 120.0));
        let json = serde_json::to_value(one.respond(vec![stored.clone()]).unwrap()).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["timestamp"], "2024-01-15T08:30:00Z");

        let many = UploadRequest::Many(vec![NewGlucoseLevel::new("alice", ts, 120.0)]);
        let json = serde_json::to_value(many.respond(vec![stored]).unwrap()).unwrap();
        assert!(json.is_array());
    }
}
