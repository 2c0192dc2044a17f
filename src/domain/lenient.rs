//! Forgiving deserializers for fields the reducer never keys on.
//!
//! A record with an odd status or timestamp still merges; the odd value
//! reads as [`AttendanceStatus::Unknown`] or `None`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::session::AttendanceStatus;

/// Status that reads `null` and anything unrecognised as `Unknown`.
pub(super) fn status<'de, D>(de: D) -> Result<AttendanceStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(de)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Optional timestamp in any of the shapes the backend has been seen to
/// send: a local date-time, an RFC 3339 timestamp (converted to UTC) or a
/// bare date (midnight). Anything else reads as `None`.
pub(super) fn timestamp<'de, D>(de: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(de)?;
    let Some(raw) = value.as_str() else {
        if !value.is_null() {
            tracing::debug!(%value, "non-string timestamp ignored");
        }
        return Ok(None);
    };
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        tracing::debug!(raw, "unrecognised timestamp ignored");
    }
    Ok(parsed)
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    raw.parse::<NaiveDateTime>()
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|t| t.naive_utc()))
        .or_else(|| {
            raw.parse::<NaiveDate>()
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
