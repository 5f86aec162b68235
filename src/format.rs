//! Text rendering of sizes, speeds and durations.

use chrono::{DateTime, Local, Utc};
use tvsurf::models::DownloadProgress;
use tvsurf::timestamp;

const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// `1.50 KB`, `100.0 MB`.
#[must_use]
pub fn bytes(value: f64) -> String {
    if value == 0.0 {
        return "0 B".to_owned();
    }
    let mut size = value.abs();
    let mut unit = 0;
    while size >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if size >= 100.0 {
        format!("{size:.1} {}", BYTE_UNITS[unit])
    } else {
        format!("{size:.2} {}", BYTE_UNITS[unit])
    }
}

#[must_use]
pub fn speed(bytes_per_second: f64) -> String {
    if bytes_per_second == 0.0 {
        return "0 B/s".to_owned();
    }
    format!("{}/s", bytes(bytes_per_second))
}

/// Remaining time as `45s`, `3m 5s` or `1h 2m 3s`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn remaining(seconds: f64) -> String {
    if seconds < 0.0 || !seconds.is_finite() {
        return "unknown".to_owned();
    }
    let total = seconds.floor() as u64;
    if total < 60 {
        return format!("{total}s");
    }
    let (minutes, secs) = (total / 60, total % 60);
    if minutes < 60 {
        return format!("{minutes}m {secs}s");
    }
    format!("{}h {}m {secs}s", minutes / 60, minutes % 60)
}

/// Download completion between 0 and 100.
#[must_use]
pub fn percent(progress: &DownloadProgress) -> f64 {
    if !progress.downloading || progress.total_size <= 0.0 {
        return 0.0;
    }
    (progress.downloaded_size / progress.total_size * 100.0).min(100.0)
}

#[must_use]
pub fn eta(progress: &DownloadProgress) -> String {
    if !progress.downloading || progress.speed <= 0.0 || progress.total_size <= 0.0 {
        return "unknown".to_owned();
    }
    let left = progress.total_size - progress.downloaded_size;
    if left <= 0.0 {
        return "done".to_owned();
    }
    remaining(left / progress.speed)
}

/// Player position as `m:ss`, or `h:mm:ss` past the hour.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn playback_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let (h, m, s) = (total / 3600, total % 3600 / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

#[must_use]
pub fn last_update(value: &DateTime<Utc>) -> String {
    if timestamp::is_never(value) {
        return "never".to_owned();
    }
    value
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}
