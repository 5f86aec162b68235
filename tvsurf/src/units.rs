//! Human friendly duration and size values used by the backend config.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use winnow::ascii::{digit1, space0, Caseless};
use winnow::combinator::{alt, opt, preceded, terminated};
use winnow::{ModalResult, Parser};

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;

const BYTE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} {value:?}")]
pub struct ParseUnitError {
    kind: &'static str,
    value: String,
}

impl ParseUnitError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

fn integer(input: &mut &str) -> ModalResult<u64> {
    digit1.parse_to().parse_next(input)
}

fn decimal(input: &mut &str) -> ModalResult<f64> {
    (digit1, opt(('.', digit1)))
        .take()
        .parse_to()
        .parse_next(input)
}

/// Day, hour, minute and (fractional) second components.
type Components = (Option<u64>, Option<u64>, Option<u64>, Option<f64>);

fn has_component((d, h, m, s): &Components) -> bool {
    d.is_some() || h.is_some() || m.is_some() || s.is_some()
}

/// `1d2h30m15s`, each unit optional but in order.
fn compact(input: &mut &str) -> ModalResult<Components> {
    (
        opt(terminated(integer, Caseless("d"))),
        opt(terminated(integer, Caseless("h"))),
        opt(terminated(integer, Caseless("m"))),
        opt(terminated(decimal, Caseless("s"))),
    )
        .verify(has_component)
        .parse_next(input)
}

/// ISO 8601 `P[nD][T[nH][nM][n[.f]S]]`, at least one component.
fn iso8601(input: &mut &str) -> ModalResult<Components> {
    (
        preceded(Caseless("P"), opt(terminated(integer, Caseless("D")))),
        opt(preceded(
            Caseless("T"),
            (
                opt(terminated(integer, Caseless("H"))),
                opt(terminated(integer, Caseless("M"))),
                opt(terminated(decimal, Caseless("S"))),
            )
                .verify(|(h, m, s): &(Option<u64>, Option<u64>, Option<f64>)| {
                    h.is_some() || m.is_some() || s.is_some()
                }),
        )),
    )
        .map(|(days, time)| {
            let (hours, minutes, seconds) = time.unwrap_or_default();
            (days, hours, minutes, seconds)
        })
        .verify(has_component)
        .parse_next(input)
}

/// A non negative duration, displayed as `1d2h30m`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeDelta(Duration);

impl TimeDelta {
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    #[must_use]
    pub const fn as_duration(&self) -> Duration {
        self.0
    }

    fn from_components((d, h, m, s): Components) -> Option<Self> {
        let whole = d
            .unwrap_or(0)
            .checked_mul(SECONDS_PER_DAY)?
            .checked_add(h.unwrap_or(0).checked_mul(SECONDS_PER_HOUR)?)?
            .checked_add(m.unwrap_or(0).checked_mul(SECONDS_PER_MINUTE)?)?;
        let seconds = Duration::try_from_secs_f64(s.unwrap_or(0.0)).ok()?;
        Duration::from_secs(whole).checked_add(seconds).map(Self)
    }
}

impl From<Duration> for TimeDelta {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

impl From<TimeDelta> for Duration {
    fn from(value: TimeDelta) -> Self {
        value.0
    }
}

impl FromStr for TimeDelta {
    type Err = ParseUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        alt((iso8601, compact))
            .parse(value)
            .ok()
            .and_then(Self::from_components)
            .ok_or_else(|| ParseUnitError::new("time delta", s))
    }
}

impl fmt::Display for TimeDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.as_secs();
        let nanos = self.0.subsec_nanos();
        if total == 0 && nanos == 0 {
            return f.write_str("0s");
        }
        let days = total / SECONDS_PER_DAY;
        let hours = total % SECONDS_PER_DAY / SECONDS_PER_HOUR;
        let minutes = total % SECONDS_PER_HOUR / SECONDS_PER_MINUTE;
        let seconds = total % SECONDS_PER_MINUTE;
        if days > 0 {
            write!(f, "{days}d")?;
        }
        if hours > 0 {
            write!(f, "{hours}h")?;
        }
        if minutes > 0 {
            write!(f, "{minutes}m")?;
        }
        if nanos > 0 {
            #[allow(clippy::cast_precision_loss)]
            let seconds = seconds as f64 + f64::from(nanos) / 1e9;
            write!(f, "{seconds}s")?;
        } else if seconds > 0 {
            write!(f, "{seconds}s")?;
        }
        Ok(())
    }
}

impl Serialize for TimeDelta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimeDelta {
    Text(String),
    Seconds(f64),
}

impl<'de> Deserialize<'de> for TimeDelta {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawTimeDelta::deserialize(deserializer)? {
            RawTimeDelta::Text(text) => text.parse().map_err(serde::de::Error::custom),
            RawTimeDelta::Seconds(secs) => Duration::try_from_secs_f64(secs)
                .map(Self)
                .map_err(serde::de::Error::custom),
        }
    }
}

fn byte_unit(input: &mut &str) -> ModalResult<i32> {
    alt((
        Caseless("KB").value(1),
        Caseless("MB").value(2),
        Caseless("GB").value(3),
        Caseless("TB").value(4),
        Caseless("PB").value(5),
        Caseless("EB").value(6),
        Caseless("B").value(0),
    ))
    .parse_next(input)
}

fn byte_size(input: &mut &str) -> ModalResult<(f64, i32)> {
    (decimal, preceded(space0, opt(byte_unit)))
        .map(|(value, unit)| (value, unit.unwrap_or(0)))
        .parse_next(input)
}

/// A size in bytes, displayed with 1024 based units (`512KB`, `1.5MB`).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(u64);

impl ByteSize {
    #[must_use]
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ByteSize {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl FromStr for ByteSize {
    type Err = ParseUnitError;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || ParseUnitError::new("byte size", s);
        let value = s.trim();
        if let Ok(bytes) = value.parse::<u64>() {
            return Ok(Self(bytes));
        }
        let (number, exponent) = byte_size.parse(value).map_err(|_| error())?;
        let bytes = (number * 1024f64.powi(exponent)).round();
        if !bytes.is_finite() || bytes < 0.0 || bytes >= u64::MAX as f64 {
            return Err(error());
        }
        Ok(Self(bytes as u64))
    }
}

impl fmt::Display for ByteSize {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut size = self.0 as f64;
        let mut unit = 0;
        while size >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
            size /= 1024.0;
            unit += 1;
        }
        let unit = BYTE_UNITS[unit];
        if size.fract() == 0.0 {
            return write!(f, "{size:.0}{unit}");
        }
        let rounded = format!("{size:.2}");
        let rounded = rounded.trim_end_matches('0').trim_end_matches('.');
        write!(f, "{rounded}{unit}")
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawByteSize {
    Bytes(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawByteSize::deserialize(deserializer)? {
            RawByteSize::Bytes(bytes) => Ok(Self(bytes)),
            RawByteSize::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(s: &str) -> String {
        s.parse::<TimeDelta>().unwrap().to_string()
    }

    fn size(s: &str) -> u64 {
        s.parse::<ByteSize>().unwrap().as_u64()
    }

    #[test]
    fn test_time_delta_iso() {
        assert_eq!(delta("P1DT2H30M"), "1d2h30m");
        assert_eq!(delta("PT1M"), "1m");
        assert_eq!(delta("P14D"), "14d");
        assert_eq!(delta("PT30S"), "30s");
        assert_eq!(delta("PT1.5S"), "1.5s");
        assert_eq!(delta("PT0S"), "0s");
    }

    #[test]
    fn test_time_delta_compact() {
        assert_eq!(delta("1d2h30m"), "1d2h30m");
        assert_eq!(delta("90m"), "1h30m");
        assert_eq!(delta("1h30m15s"), "1h30m15s");
        assert_eq!(delta(" 45s "), "45s");
        assert_eq!(
            "2h".parse::<TimeDelta>().unwrap().as_duration(),
            Duration::from_secs(7200)
        );
    }

    #[test]
    fn test_time_delta_invalid() {
        assert!("".parse::<TimeDelta>().is_err());
        assert!("1x".parse::<TimeDelta>().is_err());
        assert!("30m1h".parse::<TimeDelta>().is_err());
        assert!("soon".parse::<TimeDelta>().is_err());
        assert!("P".parse::<TimeDelta>().is_err());
        assert!("PT".parse::<TimeDelta>().is_err());
        assert!("P1DT".parse::<TimeDelta>().is_err());
    }

    #[test]
    fn test_time_delta_serde() {
        let value: TimeDelta = serde_json::from_str("\"P1D\"").unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), "\"1d\"");
        let value: TimeDelta = serde_json::from_str("90").unwrap();
        assert_eq!(value.to_string(), "1m30s");
    }

    #[test]
    fn test_byte_size_display() {
        assert_eq!(ByteSize::new(1_048_576).to_string(), "1MB");
        assert_eq!(ByteSize::new(512_000).to_string(), "500KB");
        assert_eq!(ByteSize::new(1536).to_string(), "1.5KB");
        assert_eq!(ByteSize::new(1000).to_string(), "1000B");
        assert_eq!(ByteSize::new(0).to_string(), "0B");
        assert_eq!(ByteSize::new(1_288_490_189).to_string(), "1.2GB");
    }

    #[test]
    fn test_byte_size_parse() {
        assert_eq!(size("1048576"), 1_048_576);
        assert_eq!(size("1MB"), 1_048_576);
        assert_eq!(size("512kb"), 524_288);
        assert_eq!(size("1.5 KB"), 1536);
        assert_eq!(size("2GB"), 2 * 1024 * 1024 * 1024);
        assert_eq!(size("1EB"), 1 << 60);
        assert_eq!(size("10B"), 10);
        assert!("MB".parse::<ByteSize>().is_err());
        assert!("1ZB".parse::<ByteSize>().is_err());
        assert!("-1KB".parse::<ByteSize>().is_err());
    }

    #[test]
    fn test_byte_size_serde() {
        let value: ByteSize = serde_json::from_str("\"4MB\"").unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), "4194304");
        let value: ByteSize = serde_json::from_str("1024").unwrap();
        assert_eq!(value.to_string(), "1KB");
    }
}
