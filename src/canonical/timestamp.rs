//! Timestamp normalization for the wire formats the store has emitted over time.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};

/// Numbers at or above this magnitude are epoch milliseconds, below it epoch seconds
const MILLIS_THRESHOLD: f64 = 1e11;

/// Years that survive an RFC 3339 round trip
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 0..=9999;

/// Parse any accepted timestamp representation; anything else resolves to `None`.
///
/// Accepted: epoch-seconds objects (`{"_seconds", "_nanoseconds"}` or
/// `{"seconds", "nanoseconds"}`), extended-JSON dates (`{"$date": ...}`),
/// ISO-8601 strings, and bare epoch numbers. Instants outside years 0000-9999 are
/// rejected, since they have no four-digit RFC 3339 form to re-emit.
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    parse_any(value?).filter(|at| YEAR_RANGE.contains(&at.year()))
}

fn parse_any(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => parse_text(text),
        Value::Number(number) => {
            if let Some(whole) = number.as_i64() {
                from_epoch_integer(whole)
            } else {
                number.as_f64().and_then(from_epoch_float)
            }
        }
        Value::Object(map) => parse_object(map),
        _ => None,
    }
}

/// Lossless string form used when re-emitting canonical records
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }
    None
}

fn parse_object(map: &Map<String, Value>) -> Option<DateTime<Utc>> {
    if let Some(inner) = map.get("$date") {
        return match inner {
            Value::Object(long) => long
                .get("$numberLong")
                .and_then(Value::as_str)
                .and_then(|raw| raw.parse::<i64>().ok())
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            other => parse_any(other),
        };
    }

    let seconds = map
        .get("_seconds")
        .or_else(|| map.get("seconds"))
        .and_then(Value::as_i64)?;
    let nanos = map
        .get("_nanoseconds")
        .or_else(|| map.get("nanoseconds"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let nanos = u32::try_from(nanos).ok().filter(|n| *n < 1_000_000_000)?;
    Utc.timestamp_opt(seconds, nanos).single()
}

fn from_epoch_integer(whole: i64) -> Option<DateTime<Utc>> {
    if whole.unsigned_abs() as f64 >= MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(whole).single()
    } else {
        Utc.timestamp_opt(whole, 0).single()
    }
}

fn from_epoch_float(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let millis = if value.abs() >= MILLIS_THRESHOLD {
        value.round()
    } else {
        (value * 1000.0).round()
    };
    if millis.abs() >= i64::MAX as f64 {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}
