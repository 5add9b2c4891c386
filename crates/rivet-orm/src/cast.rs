//! Declared attribute casts.
//!
//! Attributes are stored as the database returned them. A cast only shapes
//! what a read returns, so the stored and the cast forms cannot drift apart.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rivet_core::{SqlValue, TIMESTAMP_FORMAT};
use serde_json::Value;

/// Format of dates in JSON output. Date-times use [`TIMESTAMP_FORMAT`].
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const DATETIME_INPUT_FORMATS: &[&str] = &[
    TIMESTAMP_FORMAT,
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Target type of an attribute read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    Int,
    Float,
    Bool,
    String,
    /// JSON text decoded into a structured value.
    Json,
    Date,
    DateTime,
}

impl fmt::Display for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Json => "json",
            Self::Date => "date",
            Self::DateTime => "datetime",
        };
        f.write_str(name)
    }
}

impl Cast {
    /// Converts a stored value. `NULL` stays `null` under every cast.
    ///
    /// # Errors
    ///
    /// Returns a message when the value has no representation in the
    /// target type.
    pub fn apply(self, value: &SqlValue) -> Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            Self::Int => value
                .as_i64()
                .map(Value::from)
                .ok_or_else(|| format!("{value:?} is not an integer")),
            Self::Float => value
                .as_f64()
                .map(|f| SqlValue::Float(f).to_json())
                .ok_or_else(|| format!("{value:?} is not a number")),
            Self::Bool => value
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| format!("{value:?} is not a boolean")),
            Self::String => cast_string(value).map(Value::String),
            Self::Json => match value {
                SqlValue::Text(text) => serde_json::from_str(text).map_err(|e| e.to_string()),
                SqlValue::Blob(bytes) => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
                other => Ok(other.to_json()),
            },
            Self::Date => parse_date(value)
                .map(|date| Value::String(date.format(DATE_FORMAT).to_string()))
                .ok_or_else(|| format!("{value:?} is not a date")),
            Self::DateTime => parse_datetime(value)
                .map(|ts| Value::String(ts.format(TIMESTAMP_FORMAT).to_string()))
                .ok_or_else(|| format!("{value:?} is not a date-time")),
        }
    }
}

fn cast_string(value: &SqlValue) -> Result<String, String> {
    match value {
        SqlValue::Text(text) => Ok(text.clone()),
        SqlValue::Int(n) => Ok(n.to_string()),
        SqlValue::Float(f) => Ok(f.to_string()),
        SqlValue::Bool(b) => Ok(b.to_string()),
        SqlValue::Timestamp(ts) => Ok(ts.format(TIMESTAMP_FORMAT).to_string()),
        SqlValue::Blob(bytes) => String::from_utf8(bytes.clone()).map_err(|e| e.to_string()),
        SqlValue::Null => Ok(String::new()),
    }
}

/// Reads a stored date-time in any of the formats drivers return.
#[must_use]
pub fn parse_datetime(value: &SqlValue) -> Option<NaiveDateTime> {
    match value {
        SqlValue::Timestamp(ts) => Some(*ts),
        SqlValue::Text(text) => {
            let text = text.trim();
            DATETIME_INPUT_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(text, DATE_FORMAT)
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                })
        }
        _ => None,
    }
}

/// Reads a stored date, dropping any time part.
#[must_use]
pub fn parse_date(value: &SqlValue) -> Option<NaiveDate> {
    match value {
        SqlValue::Text(text) => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
            .ok()
            .or_else(|| parse_datetime(value).map(|ts| ts.date())),
        other => parse_datetime(other).map(|ts| ts.date()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_passes_through() {
        for cast in [Cast::Int, Cast::Json, Cast::Date] {
            assert_eq!(cast.apply(&SqlValue::Null), Ok(Value::Null));
        }
    }

    #[test]
    fn test_scalar_casts() {
        assert_eq!(Cast::Int.apply(&SqlValue::Text("42".into())), Ok(json!(42)));
        assert_eq!(Cast::Float.apply(&SqlValue::Int(3)), Ok(json!(3.0)));
        assert_eq!(Cast::Bool.apply(&SqlValue::Int(1)), Ok(json!(true)));
        assert_eq!(Cast::Bool.apply(&SqlValue::Text("off".into())), Ok(json!(false)));
        assert_eq!(Cast::String.apply(&SqlValue::Int(7)), Ok(json!("7")));
        assert!(Cast::Int.apply(&SqlValue::Text("seven".into())).is_err());
    }

    #[test]
    fn test_json_cast() {
        let stored = SqlValue::Text(r#"{"theme":"dark","tags":[1,2]}"#.into());
        assert_eq!(
            Cast::Json.apply(&stored),
            Ok(json!({"theme": "dark", "tags": [1, 2]}))
        );
        assert!(Cast::Json.apply(&SqlValue::Text("{oops".into())).is_err());
    }

    #[test]
    fn test_temporal_casts() {
        let stored = SqlValue::Text("2024-03-05 14:30:00".into());
        assert_eq!(Cast::Date.apply(&stored), Ok(json!("2024-03-05")));
        assert_eq!(Cast::DateTime.apply(&stored), Ok(json!("2024-03-05 14:30:00")));
        assert_eq!(
            Cast::DateTime.apply(&SqlValue::Text("2024-03-05T08:00:00.250".into())),
            Ok(json!("2024-03-05 08:00:00"))
        );
        assert_eq!(
            Cast::DateTime.apply(&SqlValue::Text("2024-03-05".into())),
            Ok(json!("2024-03-05 00:00:00"))
        );
        assert!(Cast::Date.apply(&SqlValue::Text("yesterday".into())).is_err());
    }
}
