//! Per-provider normalizers: raw payload in, canonical record out.
//!
//! Every function here is pure. Providers rename fields between API
//! versions, so each lookup goes through a list of known synonyms and a
//! missing optional field reads as zero/empty rather than an error. A payload
//! with no resolvable identity yields `None`.

pub mod clerk;
pub mod congress;
pub mod govtrack;
pub mod roster;
pub mod senate;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;

/// Parse the date/time spellings the providers use into an absolute instant.
///
/// Zone-less values are taken as UTC. Accepted: RFC 3339, `YYYY-MM-DDTHH:MM[:SS]`,
/// `YYYY-MM-DD`, `17-Jan-2025`, and `January 9, 2025, 03:17 PM`.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%B %d, %Y, %I:%M %p", "%B %d, %Y %I:%M %p"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    parse_date(s).map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    ["%Y-%m-%d", "%d-%b-%Y", "%B %d, %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s.trim(), fmt).ok())
}

/// Clock time as `14:08`, `14:08:30`, or `2:08 PM`.
pub(crate) fn parse_time(s: &str) -> Option<NaiveTime> {
    ["%H:%M", "%H:%M:%S", "%I:%M %p", "%l:%M %p"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s.trim(), fmt).ok())
}

/// First present, non-null field among `names`.
pub(crate) fn field<'a>(obj: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|v| !v.is_null())
}

/// Lenient non-negative count: JSON numbers, numeric strings (with thousands
/// separators), and floats rounded to nearest.
pub(crate) fn as_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|n| n.min(u64::from(u32::MAX)) as u32)
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u32)),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            cleaned
                .parse::<u32>()
                .ok()
                .or_else(|| cleaned.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f.round() as u32))
        }
        _ => None,
    }
}

pub(crate) fn count_field(obj: &Value, names: &[&str]) -> u32 {
    field(obj, names).and_then(as_count).unwrap_or(0)
}

pub(crate) fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

/// Strings and numbers both read as text; identifiers arrive as either.
pub(crate) fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn text_field(obj: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find_map(as_text)
}
