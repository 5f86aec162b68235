//! Serde glue for backend timestamps. The backend writes naive ISO strings
//! (implicitly UTC) while other producers use RFC 3339; both are accepted.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// The backend uses `0001-01-01T00:00:00` for "never happened".
#[must_use]
pub fn is_never(timestamp: &DateTime<Utc>) -> bool {
    timestamp.year() <= 1
}

/// Parse either timestamp form.
///
/// # Errors
/// Returns the naive parse error if neither form matches.
pub fn parse(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, NAIVE_FORMAT).map(|dt| dt.and_utc())
}

pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let value = timestamp.naive_utc().format(NAIVE_FORMAT).to_string();
    serializer.serialize_str(&value)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    parse(&value).map_err(serde::de::Error::custom)
}
