//! Article date parsing.
//!
//! Upstream dates are ISO-8601 with milliseconds and offset
//! (`2024-03-01T17:45:12.000+01:00`), but some payloads carry epoch numbers
//! instead, in either seconds or milliseconds.

use chrono::{DateTime, TimeZone, Utc};

/// Primary date format.
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// Epoch values at or above this are taken as seconds (2020-09-13 onwards).
const MIN_EPOCH_SECONDS: i64 = 1_600_000_000;

/// Epoch values at or above this are already milliseconds.
const MIN_EPOCH_MILLIS: i64 = 1_000_000_000_000;

/// A date as it appeared on the wire, before interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDate {
    Text(String),
    Number(f64),
}

/// Interprets a raw date. Returns `None` (and logs) when neither the ISO
/// format nor the numeric fallback applies.
pub fn parse_raw_date(raw: &RawDate) -> Option<DateTime<Utc>> {
    let parsed = match raw {
        RawDate::Text(text) => parse_date_text(text),
        RawDate::Number(n) => from_epoch(*n as i64),
    };
    if parsed.is_none() {
        tracing::debug!(value = ?raw, "Unparseable article date, leaving it unset");
    }
    parsed
}

/// Parses the ISO format, falling back to a numeric epoch in the text.
pub fn parse_date_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_str(text, ISO_FORMAT) {
        return Some(dt.with_timezone(&Utc));
    }
    text.parse::<i64>().ok().and_then(from_epoch)
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    let millis = if value >= MIN_EPOCH_MILLIS {
        value
    } else if value >= MIN_EPOCH_SECONDS {
        value.checked_mul(1000)?
    } else {
        return None;
    };
    Utc.timestamp_millis_opt(millis).single()
}
