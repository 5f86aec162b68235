//! Grouping, ordering and per episode state derived from backend records.

use std::cmp::Reverse;

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use tvsurf::models::{DownloadStatus, ErrorRecord, Series, Tag, TvDetails, TvInfo};

/// Groups `tvs` by tag in display order, most recently active first.
#[must_use]
pub fn group_by_tag(tvs: &[TvInfo]) -> Vec<(Tag, Vec<&TvInfo>)> {
    let mut groups = tvs.iter().into_group_map_by(|tv| tv.user_data.tag);
    Tag::DISPLAY_ORDER
        .iter()
        .filter_map(|tag| {
            let mut group = groups.remove(tag)?;
            group.sort_by_key(|tv| Reverse(tv.latest_activity()));
            Some((*tag, group))
        })
        .collect()
}

/// Episodes left after the current watch position.
#[must_use]
pub fn unwatched(tv: &TvInfo) -> i64 {
    tv.total_episodes - tv.user_data.watch_progress.episode_id
}

/// The unwatched count, shown only for TVs being watched.
#[must_use]
pub fn unwatched_badge(tv: &TvInfo) -> Option<i64> {
    let count = unwatched(tv);
    (tv.user_data.tag == Tag::Watching && count > 0).then_some(count)
}

#[derive(Debug, Clone)]
pub struct SeriesOverview<'a> {
    pub series: &'a Series,
    pub tvs: Vec<&'a TvInfo>,
    pub latest_activity: Option<DateTime<Utc>>,
}

/// Series with their known member TVs, most recently active series first.
#[must_use]
pub fn series_overview<'a>(series: &'a [Series], tvs: &'a [TvInfo]) -> Vec<SeriesOverview<'a>> {
    let by_id: AHashMap<i64, &TvInfo> = tvs.iter().map(|tv| (tv.id, tv)).collect();
    series
        .iter()
        .map(|series| {
            let members: Vec<&TvInfo> = series
                .tvs
                .iter()
                .filter_map(|id| by_id.get(id).copied())
                .sorted_by_key(|tv| Reverse(tv.last_update))
                .collect();
            let latest_activity = members
                .iter()
                .map(|tv| tv.latest_activity())
                .chain(std::iter::once(series.last_update))
                .max();
            SeriesOverview {
                series,
                tvs: members,
                latest_activity,
            }
        })
        .sorted_by_key(|overview| Reverse(overview.latest_activity))
        .collect()
}

/// Error log entries, newest first.
#[must_use]
pub fn sorted_errors(errors: &[ErrorRecord]) -> Vec<&ErrorRecord> {
    errors
        .iter()
        .sorted_by_key(|e| Reverse(e.timestamp))
        .collect()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Move {
    Forward,
    Backward,
    First,
    Last,
}

/// Ordered TV list of a series being edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesEditor {
    tvs: Vec<i64>,
}

impl SeriesEditor {
    #[must_use]
    pub fn new(tvs: Vec<i64>) -> Self {
        Self { tvs }
    }

    #[must_use]
    pub fn tvs(&self) -> &[i64] {
        &self.tvs
    }

    #[must_use]
    pub fn into_tvs(self) -> Vec<i64> {
        self.tvs
    }

    /// Appends `tv_id`. Returns `false` if it was already present.
    pub fn add(&mut self, tv_id: i64) -> bool {
        if self.tvs.contains(&tv_id) {
            return false;
        }
        self.tvs.push(tv_id);
        true
    }

    pub fn remove(&mut self, tv_id: i64) -> bool {
        let before = self.tvs.len();
        self.tvs.retain(|id| *id != tv_id);
        before != self.tvs.len()
    }

    /// Returns `false` when `tv_id` is missing or already at that edge.
    pub fn apply(&mut self, tv_id: i64, movement: Move) -> bool {
        let Some(index) = self.tvs.iter().position(|id| *id == tv_id) else {
            return false;
        };
        let last = self.tvs.len() - 1;
        match movement {
            Move::Forward if index > 0 => self.tvs.swap(index - 1, index),
            Move::Backward if index < last => self.tvs.swap(index, index + 1),
            Move::First if index > 0 => {
                let id = self.tvs.remove(index);
                self.tvs.insert(0, id);
            }
            Move::Last if index < last => {
                let id = self.tvs.remove(index);
                self.tvs.push(id);
            }
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EpisodeStorage {
    Downloaded,
    Downloading,
    Failed,
    Missing,
}

impl EpisodeStorage {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            EpisodeStorage::Downloaded => "downloaded",
            EpisodeStorage::Downloading => "downloading",
            EpisodeStorage::Failed => "failed",
            EpisodeStorage::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeState {
    pub index: usize,
    pub name: String,
    pub storage: EpisodeStorage,
    pub selectable: bool,
    pub watched: bool,
}

/// Whether episode `index` counts as watched for the stored progress.
#[must_use]
pub fn is_watched(details: &TvDetails, index: usize) -> bool {
    let progress = details.info.user_data.watch_progress;
    let Ok(index) = i64::try_from(index) else {
        return false;
    };
    progress.episode_id > index || (progress.episode_id == index && progress.time > 0.0)
}

/// One entry per source episode.
#[must_use]
pub fn episode_states(details: &TvDetails) -> Vec<EpisodeState> {
    details
        .tv
        .source
        .episodes
        .iter()
        .enumerate()
        .map(|(index, episode)| {
            let storage = match details.tv.storage.episodes.get(index).map(|e| e.status) {
                Some(DownloadStatus::Success) => EpisodeStorage::Downloaded,
                Some(DownloadStatus::Running) => EpisodeStorage::Downloading,
                Some(DownloadStatus::Failed) => EpisodeStorage::Failed,
                None => EpisodeStorage::Missing,
            };
            EpisodeState {
                index,
                name: episode.name.clone(),
                storage,
                selectable: matches!(
                    storage,
                    EpisodeStorage::Downloaded | EpisodeStorage::Downloading
                ),
                watched: is_watched(details, index),
            }
        })
        .collect()
}
