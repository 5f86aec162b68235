use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::absolute_url;
use crate::units::{ByteSize, TimeDelta};

/// User assigned watch status of a TV.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Watching,
    Wanted,
    Watched,
    OnHold,
    NotTagged,
}

impl Tag {
    /// Order in which tag groups are listed.
    pub const DISPLAY_ORDER: [Tag; 5] = [
        Tag::Watching,
        Tag::Wanted,
        Tag::OnHold,
        Tag::Watched,
        Tag::NotTagged,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Watching => "watching",
            Tag::Wanted => "wanted",
            Tag::Watched => "watched",
            Tag::OnHold => "on_hold",
            Tag::NotTagged => "not_tagged",
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Tag::Watching => "Watching",
            Tag::Wanted => "Want to watch",
            Tag::Watched => "Watched",
            Tag::OnHold => "On hold",
            Tag::NotTagged => "Not tagged",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tag {0:?}, expected one of watching, wanted, watched, on_hold, not_tagged")]
pub struct UnknownTag(pub String);

impl FromStr for Tag {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "watching" => Ok(Tag::Watching),
            "wanted" => Ok(Tag::Wanted),
            "watched" => Ok(Tag::Watched),
            "on_hold" => Ok(Tag::OnHold),
            "not_tagged" => Ok(Tag::NotTagged),
            _ => Err(UnknownTag(s.to_owned())),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchProgress {
    pub episode_id: i64,
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTvData {
    pub tv_id: i64,
    pub tag: Tag,
    pub watch_progress: WatchProgress,
    #[serde(with = "crate::timestamp")]
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TvInfo {
    pub id: i64,
    pub name: String,
    pub cover_url: String,
    pub series: Vec<i64>,
    #[serde(with = "crate::timestamp")]
    pub last_update: DateTime<Utc>,
    pub total_episodes: i64,
    pub user_data: UserTvData,
}

impl TvInfo {
    /// The later of the TV update and the user data update.
    #[must_use]
    pub fn latest_activity(&self) -> DateTime<Utc> {
        self.last_update.max(self.user_data.last_update)
    }

    #[must_use]
    pub fn with_base_url(mut self, base: &Url) -> Self {
        self.cover_url = absolute_url(base, &self.cover_url);
        self
    }
}

/// A user defined, ordered playlist of TVs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: i64,
    pub name: String,
    pub tvs: Vec<i64>,
    #[serde(with = "crate::timestamp")]
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUrl {
    pub source_key: String,
    pub source_name: String,
    pub channel_name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEpisode {
    pub source: SourceUrl,
    pub name: String,
}

/// A provider listing of a TV with per episode stream urls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub source: SourceUrl,
    pub name: String,
    pub cover_url: String,
    pub episodes: Vec<SourceEpisode>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Running,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEpisode {
    pub name: String,
    pub filename: String,
    pub status: DownloadStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storage {
    pub directory: String,
    pub episodes: Vec<StorageEpisode>,
    pub cover: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackStatus {
    pub tracking: bool,
    #[serde(with = "crate::timestamp")]
    pub latest_update: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tv {
    pub id: i64,
    pub name: String,
    pub source: Source,
    pub storage: Storage,
    pub track: TrackStatus,
    #[serde(default)]
    pub series: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TvDetails {
    pub tv: Tv,
    pub info: TvInfo,
    /// Playable url per source episode, `None` while not downloaded.
    pub episodes: Vec<Option<String>>,
}

impl TvDetails {
    #[must_use]
    pub fn with_base_url(mut self, base: &Url) -> Self {
        self.info = self.info.with_base_url(base);
        for episode in self.episodes.iter_mut().flatten() {
            *episode = absolute_url(base, episode);
        }
        self
    }

    #[must_use]
    pub fn episode_url(&self, index: usize) -> Option<&str> {
        self.episodes.get(index).and_then(|e| e.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub status: String,
    pub downloading: bool,
    pub total_size: f64,
    pub downloaded_size: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgressWithName {
    pub name: String,
    pub progress: DownloadProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchError {
    pub source_name: String,
    pub source_key: String,
    pub error: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Error,
    Critical,
}

/// Entry of the background job error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: i64,
    #[serde(with = "crate::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ErrorType,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    #[serde(default)]
    pub download_count: u32,
    #[serde(default)]
    pub error_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub group: Vec<String>,
}

impl UserInfo {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.group.iter().any(|g| g == "admin")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whoami {
    pub user: UserInfo,
    #[serde(default)]
    pub single_user_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Users {
    pub users: Vec<UserInfo>,
    #[serde(default)]
    pub single_user_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    pub update_interval: TimeDelta,
    pub tracking_timeout: TimeDelta,
    pub update_parallel: u32,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    pub connect_timeout: TimeDelta,
    pub chunk_size: ByteSize,
    pub max_concurrent_fragments: u32,
    pub max_concurrent_downloads: u32,
    pub max_retries: u32,
    pub download_timeout: TimeDelta,
    pub retry_interval: TimeDelta,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbConfig {
    pub save_interval: TimeDelta,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Backend tuning parameters. Keys this client does not know about are kept
/// in `other` so a read-modify-write cycle does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub updater: UpdaterConfig,
    pub download: DownloadConfig,
    pub db: DbConfig,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigKeyError {
    #[error("unknown config key {0:?}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl Config {
    /// Every editable key in `section.field` form.
    pub const KEYS: [&'static str; 11] = [
        "updater.update_interval",
        "updater.tracking_timeout",
        "updater.update_parallel",
        "download.connect_timeout",
        "download.chunk_size",
        "download.max_concurrent_fragments",
        "download.max_concurrent_downloads",
        "download.max_retries",
        "download.download_timeout",
        "download.retry_interval",
        "db.save_interval",
    ];

    /// Human readable value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "updater.update_interval" => self.updater.update_interval.to_string(),
            "updater.tracking_timeout" => self.updater.tracking_timeout.to_string(),
            "updater.update_parallel" => self.updater.update_parallel.to_string(),
            "download.connect_timeout" => self.download.connect_timeout.to_string(),
            "download.chunk_size" => self.download.chunk_size.to_string(),
            "download.max_concurrent_fragments" => {
                self.download.max_concurrent_fragments.to_string()
            }
            "download.max_concurrent_downloads" => {
                self.download.max_concurrent_downloads.to_string()
            }
            "download.max_retries" => self.download.max_retries.to_string(),
            "download.download_timeout" => self.download.download_timeout.to_string(),
            "download.retry_interval" => self.download.retry_interval.to_string(),
            "db.save_interval" => self.db.save_interval.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Parse `value` and assign it to `key`.
    ///
    /// # Errors
    /// [`ConfigKeyError::UnknownKey`]: If `key` is not one of [`Config::KEYS`].
    /// [`ConfigKeyError::InvalidValue`]: If `value` does not parse for that key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigKeyError> {
        fn parse<T>(key: &str, value: &str) -> Result<T, ConfigKeyError>
        where
            T: FromStr,
            T::Err: fmt::Display,
        {
            value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigKeyError::InvalidValue {
                    key: key.to_owned(),
                    reason: e.to_string(),
                })
        }

        match key {
            "updater.update_interval" => self.updater.update_interval = parse(key, value)?,
            "updater.tracking_timeout" => self.updater.tracking_timeout = parse(key, value)?,
            "updater.update_parallel" => self.updater.update_parallel = parse(key, value)?,
            "download.connect_timeout" => self.download.connect_timeout = parse(key, value)?,
            "download.chunk_size" => self.download.chunk_size = parse(key, value)?,
            "download.max_concurrent_fragments" => {
                self.download.max_concurrent_fragments = parse(key, value)?;
            }
            "download.max_concurrent_downloads" => {
                self.download.max_concurrent_downloads = parse(key, value)?;
            }
            "download.max_retries" => self.download.max_retries = parse(key, value)?,
            "download.download_timeout" => self.download.download_timeout = parse(key, value)?,
            "download.retry_interval" => self.download.retry_interval = parse(key, value)?,
            "db.save_interval" => self.db.save_interval = parse(key, value)?,
            _ => return Err(ConfigKeyError::UnknownKey(key.to_owned())),
        }
        Ok(())
    }
}
