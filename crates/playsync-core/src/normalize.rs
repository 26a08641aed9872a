//! Canonical comparable forms for raw values, per wire type.
//!
//! Normalization is pure and idempotent: feeding a normalized value back in
//! yields the same value.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::mapping::WireType;
use crate::models::FieldValue;

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M";
const NAIVE_DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Canonical form of a value for comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NormalizedValue(String);

impl NormalizedValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize `raw` for comparison as `wire_type`.
pub fn normalize(raw: &FieldValue, wire_type: WireType) -> NormalizedValue {
    if is_blank(raw) {
        return NormalizedValue::default();
    }

    let value = match wire_type {
        WireType::Date => normalize_date(&raw.to_text()).unwrap_or_default(),
        WireType::Number => normalize_number(raw),
        WireType::Title | WireType::Url | WireType::Text => raw.to_text().trim().to_string(),
    };
    NormalizedValue(value)
}

/// Null, blank text and the literal `none` all mean "no value".
pub(crate) fn is_blank(raw: &FieldValue) -> bool {
    match raw {
        FieldValue::Null => true,
        FieldValue::Text(text) => {
            let text = text.trim();
            text.is_empty() || text.eq_ignore_ascii_case("none")
        }
        FieldValue::Bool(_) | FieldValue::Number(_) => false,
    }
}

fn normalize_number(raw: &FieldValue) -> String {
    let Some(value) = raw.as_f64() else {
        return raw.to_text().trim().to_string();
    };

    let rounded = (value * 10.0).round() / 10.0;
    if rounded == 0.0 {
        "0".to_string()
    } else if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        format!("{rounded:.1}")
    }
}

/// Parse an ISO-8601 timestamp and render it at minute precision.
///
/// Offset-aware values are converted to UTC; naive values are taken as UTC.
/// Date-only values mean midnight.
fn normalize_date(text: &str) -> Option<String> {
    parse_timestamp(text.trim()).map(|timestamp| timestamp.format(DATE_FORMAT).to_string())
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.with_timezone(&Utc).naive_utc());
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(text, format) {
            return Some(timestamp);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
