//! Offline mode.
//!
//! Entering offline mode downloads a snapshot of everything the CLI reads.
//! While offline, reads are served from that snapshot and writes update it and
//! are queued. Leaving offline mode replays the queue against the backend in
//! order.

use std::path::{Path, PathBuf};

use ahash::AHashMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tvsurf::models::{Series, Tag, TvDetails, TvInfo, UserTvData, Whoami};

use crate::errors::{Error, Result};
use crate::playback::ProgressSink;
use crate::storage;

const OFFLINE_DIR: &str = "offline";
const SNAPSHOT_FILE: &str = "snapshot.json";
const PENDING_FILE: &str = "pending.json";

/// A write made while offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingOperation {
    WatchProgress {
        tv_id: i64,
        episode_id: i64,
        time: f64,
    },
    TagChange {
        tv_id: i64,
        tag: Tag,
    },
    TrackingChange {
        tv_id: i64,
        tracking: bool,
    },
    /// `temp_id` is the negative id handed out locally.
    AddSeries {
        temp_id: i64,
        name: String,
    },
    UpdateSeriesTvs {
        id: i64,
        tvs: Vec<i64>,
    },
    RemoveSeries {
        id: i64,
    },
}

impl PendingOperation {
    /// Whether `other` supersedes this queued entry.
    fn replaced_by(&self, other: &PendingOperation) -> bool {
        use PendingOperation::{TagChange, TrackingChange, WatchProgress};
        match (self, other) {
            (WatchProgress { tv_id: a, .. }, WatchProgress { tv_id: b, .. })
            | (TagChange { tv_id: a, .. }, TagChange { tv_id: b, .. })
            | (TrackingChange { tv_id: a, .. }, TrackingChange { tv_id: b, .. }) => a == b,
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            PendingOperation::WatchProgress {
                tv_id, episode_id, ..
            } => format!("watch progress of tv {tv_id} episode {episode_id}"),
            PendingOperation::TagChange { tv_id, tag } => format!("tag {tag} of tv {tv_id}"),
            PendingOperation::TrackingChange { tv_id, tracking } => {
                format!("tracking {tracking} of tv {tv_id}")
            }
            PendingOperation::AddSeries { name, .. } => format!("new series {name:?}"),
            PendingOperation::UpdateSeriesTvs { id, .. } => format!("tvs of series {id}"),
            PendingOperation::RemoveSeries { id } => format!("removal of series {id}"),
        }
    }
}

impl std::fmt::Display for PendingOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub offline: bool,
    pub synced_at: Option<DateTime<Utc>>,
    pub whoami: Option<Whoami>,
    pub tvs: Vec<TvInfo>,
    pub series: Vec<Series>,
    pub details: Vec<TvDetails>,
    /// Next temporary id for series created offline, counts down from -1.
    #[serde(default)]
    pub next_temp_id: i64,
    /// Temporary series ids already created on the backend.
    #[serde(default)]
    pub resolved_ids: AHashMap<i64, i64>,
}

/// Outcome of leaving offline mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReport {
    Synced(usize),
    Discarded(usize),
}

#[derive(Debug)]
pub struct OfflineStore {
    dir: PathBuf,
    snapshot: Snapshot,
    pending: Vec<PendingOperation>,
}

impl OfflineStore {
    /// Load the persisted offline state below `data_dir`.
    #[must_use]
    pub fn open(data_dir: &Path) -> Self {
        let dir = data_dir.join(OFFLINE_DIR);
        let snapshot = storage::read_json_or_default(&dir.join(SNAPSHOT_FILE));
        let pending = storage::read_json_or_default(&dir.join(PENDING_FILE));
        Self {
            dir,
            snapshot,
            pending,
        }
    }

    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.snapshot.offline
    }

    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    #[must_use]
    pub fn pending(&self) -> &[PendingOperation] {
        &self.pending
    }

    fn save_snapshot(&self) -> Result<()> {
        storage::write_json(&self.dir.join(SNAPSHOT_FILE), &self.snapshot)
    }

    fn save_pending(&self) -> Result<()> {
        storage::write_json(&self.dir.join(PENDING_FILE), &self.pending)
    }

    fn save(&self) -> Result<()> {
        self.save_snapshot()?;
        self.save_pending()
    }

    /// Download a snapshot and switch to offline mode.
    ///
    /// # Errors
    /// [`Error::AlreadyOffline`]: If offline mode is already active.
    /// [`Error::Api`]: If any download failed; the store is left unchanged.
    pub async fn enter(&mut self, client: &tvsurf::Client) -> Result<()> {
        if self.is_offline() {
            return Err(Error::AlreadyOffline);
        }
        info!("downloading offline snapshot");
        let whoami = tvsurf::user::whoami(client).await?;
        let tvs = tvsurf::tv::infos(client, None).await?;
        let series = tvsurf::series::list(client, None).await?;
        let ids: Vec<i64> = tvs.iter().map(|tv| tv.id).collect();
        let details = tvsurf::tv::multiple_details(client, Some(&ids)).await?;
        debug!(
            tvs = tvs.len(),
            series = series.len(),
            details = details.len(),
            "offline snapshot downloaded"
        );
        self.snapshot = Snapshot {
            offline: true,
            synced_at: Some(Utc::now()),
            whoami: Some(whoami),
            tvs,
            series,
            details,
            next_temp_id: -1,
            resolved_ids: AHashMap::new(),
        };
        self.pending.clear();
        self.save()
    }

    /// Replay queued writes and leave offline mode.
    ///
    /// Each entry is removed once the backend accepted it. On the first
    /// failure the remaining entries stay queued and offline mode stays
    /// active, unless `force` is set, in which case everything still queued
    /// is discarded.
    ///
    /// # Errors
    /// [`Error::NotOffline`]: If offline mode is not active.
    /// [`Error::Sync`]: If an entry was rejected and `force` is not set.
    pub async fn exit(&mut self, client: &tvsurf::Client, force: bool) -> Result<ExitReport> {
        if !self.is_offline() {
            return Err(Error::NotOffline);
        }
        let mut synced = 0;
        while let Some(operation) = self.pending.first().cloned() {
            match replay(client, &operation, &self.snapshot.resolved_ids).await {
                Ok(created) => {
                    self.pending.remove(0);
                    if let Some((temp_id, id)) = created {
                        self.resolve_series(temp_id, id);
                    }
                    self.save()?;
                    synced += 1;
                }
                Err(source) => {
                    warn!("failed to sync {operation}: {source}");
                    if force {
                        let discarded = self.pending.len();
                        self.leave()?;
                        return Ok(ExitReport::Discarded(discarded));
                    }
                    return Err(Error::Sync {
                        operation: operation.describe(),
                        source,
                    });
                }
            }
        }
        self.leave()?;
        Ok(ExitReport::Synced(synced))
    }

    fn leave(&mut self) -> Result<()> {
        self.snapshot = Snapshot::default();
        self.pending.clear();
        self.save()
    }

    /// Points queued entries and the snapshot at the id the backend assigned
    /// to a series created offline.
    fn resolve_series(&mut self, temp_id: i64, id: i64) {
        self.snapshot.resolved_ids.insert(temp_id, id);
        for operation in &mut self.pending {
            if let PendingOperation::UpdateSeriesTvs { id: queued, .. }
            | PendingOperation::RemoveSeries { id: queued } = operation
            {
                if *queued == temp_id {
                    *queued = id;
                }
            }
        }
        let remap = |ids: &mut Vec<i64>| {
            for series in ids.iter_mut().filter(|s| **s == temp_id) {
                *series = id;
            }
        };
        for series in self.snapshot.series.iter_mut().filter(|s| s.id == temp_id) {
            series.id = id;
        }
        for tv in &mut self.snapshot.tvs {
            remap(&mut tv.series);
        }
        for details in &mut self.snapshot.details {
            remap(&mut details.tv.series);
            remap(&mut details.info.series);
        }
    }

    /// The backend id of a series, for ids handed out before a partial sync.
    fn series_id(&self, id: i64) -> i64 {
        self.snapshot.resolved_ids.get(&id).copied().unwrap_or(id)
    }

    fn push(&mut self, operation: PendingOperation) {
        self.pending.retain(|queued| !queued.replaced_by(&operation));
        self.pending.push(operation);
    }

    fn require_offline(&self) -> Result<()> {
        if self.is_offline() {
            Ok(())
        } else {
            Err(Error::NotOffline)
        }
    }

    /// TV summaries, optionally restricted to `ids`.
    #[must_use]
    pub fn tv_infos(&self, ids: Option<&[i64]>) -> Vec<TvInfo> {
        self.snapshot
            .tvs
            .iter()
            .filter(|tv| ids.map_or(true, |ids| ids.contains(&tv.id)))
            .cloned()
            .collect()
    }

    /// # Errors
    /// [`Error::TvNotFound`]: If the TV is not part of the snapshot.
    pub fn tv_details(&self, id: i64) -> Result<TvDetails> {
        self.snapshot
            .details
            .iter()
            .find(|d| d.tv.id == id)
            .cloned()
            .ok_or(Error::TvNotFound(id))
    }

    #[must_use]
    pub fn series(&self, ids: Option<&[i64]>) -> Vec<Series> {
        let ids: Option<Vec<i64>> = ids.map(|ids| ids.iter().map(|id| self.series_id(*id)).collect());
        self.snapshot
            .series
            .iter()
            .filter(|s| ids.as_ref().map_or(true, |ids| ids.contains(&s.id)))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn whoami(&self) -> Option<&Whoami> {
        self.snapshot.whoami.as_ref()
    }

    fn update_user_data(&mut self, tv_id: i64, update: impl Fn(&mut UserTvData)) -> Result<()> {
        let mut found = false;
        for tv in self.snapshot.tvs.iter_mut().filter(|tv| tv.id == tv_id) {
            update(&mut tv.user_data);
            tv.user_data.last_update = Utc::now();
            found = true;
        }
        for details in self.snapshot.details.iter_mut().filter(|d| d.tv.id == tv_id) {
            update(&mut details.info.user_data);
            details.info.user_data.last_update = Utc::now();
            found = true;
        }
        if found {
            Ok(())
        } else {
            Err(Error::TvNotFound(tv_id))
        }
    }

    /// # Errors
    /// [`Error::NotOffline`]: If offline mode is not active.
    /// [`Error::TvNotFound`]: If the TV is not part of the snapshot.
    pub fn set_watch_progress(&mut self, tv_id: i64, episode_id: i64, time: f64) -> Result<()> {
        self.require_offline()?;
        self.update_user_data(tv_id, |data| {
            data.watch_progress.episode_id = episode_id;
            data.watch_progress.time = time;
        })?;
        self.push(PendingOperation::WatchProgress {
            tv_id,
            episode_id,
            time,
        });
        self.save()
    }

    /// # Errors
    /// [`Error::NotOffline`]: If offline mode is not active.
    /// [`Error::TvNotFound`]: If the TV is not part of the snapshot.
    pub fn set_tag(&mut self, tv_id: i64, tag: Tag) -> Result<()> {
        self.require_offline()?;
        self.update_user_data(tv_id, |data| data.tag = tag)?;
        self.push(PendingOperation::TagChange { tv_id, tag });
        self.save()
    }

    /// # Errors
    /// [`Error::NotOffline`]: If offline mode is not active.
    /// [`Error::TvNotFound`]: If the TV is not part of the snapshot.
    pub fn set_tracking(&mut self, tv_id: i64, tracking: bool) -> Result<()> {
        self.require_offline()?;
        let details = self
            .snapshot
            .details
            .iter_mut()
            .find(|d| d.tv.id == tv_id)
            .ok_or(Error::TvNotFound(tv_id))?;
        details.tv.track.tracking = tracking;
        self.push(PendingOperation::TrackingChange { tv_id, tracking });
        self.save()
    }

    /// Create a series locally and return its temporary (negative) id.
    ///
    /// # Errors
    /// [`Error::NotOffline`]: If offline mode is not active.
    pub fn add_series(&mut self, name: &str) -> Result<i64> {
        self.require_offline()?;
        let temp_id = self.snapshot.next_temp_id.min(-1);
        self.snapshot.next_temp_id = temp_id - 1;
        self.snapshot.series.push(Series {
            id: temp_id,
            name: name.to_owned(),
            tvs: Vec::new(),
            last_update: Utc::now(),
        });
        self.push(PendingOperation::AddSeries {
            temp_id,
            name: name.to_owned(),
        });
        self.save()?;
        Ok(temp_id)
    }

    /// # Errors
    /// [`Error::NotOffline`]: If offline mode is not active.
    /// [`Error::SeriesNotFound`]: If the series is not part of the snapshot.
    pub fn update_series_tvs(&mut self, id: i64, tvs: &[i64]) -> Result<()> {
        self.require_offline()?;
        let id = self.series_id(id);
        let series = self
            .snapshot
            .series
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(Error::SeriesNotFound(id))?;
        series.tvs = tvs.to_vec();
        series.last_update = Utc::now();
        for tv in &mut self.snapshot.tvs {
            let member = tvs.contains(&tv.id);
            let listed = tv.series.contains(&id);
            if member && !listed {
                tv.series.push(id);
            } else if !member && listed {
                tv.series.retain(|s| *s != id);
            }
        }
        self.push(PendingOperation::UpdateSeriesTvs {
            id,
            tvs: tvs.to_vec(),
        });
        self.save()
    }

    /// # Errors
    /// [`Error::NotOffline`]: If offline mode is not active.
    /// [`Error::SeriesNotFound`]: If the series is not part of the snapshot.
    pub fn remove_series(&mut self, id: i64) -> Result<()> {
        self.require_offline()?;
        let id = self.series_id(id);
        let before = self.snapshot.series.len();
        self.snapshot.series.retain(|s| s.id != id);
        if before == self.snapshot.series.len() {
            return Err(Error::SeriesNotFound(id));
        }
        for tv in &mut self.snapshot.tvs {
            tv.series.retain(|s| *s != id);
        }
        self.push(PendingOperation::RemoveSeries { id });
        self.save()
    }
}

/// Sends one queued write. Returns the temporary and real id of a series
/// created on the backend.
async fn replay(
    client: &tvsurf::Client,
    operation: &PendingOperation,
    resolved: &AHashMap<i64, i64>,
) -> std::result::Result<Option<(i64, i64)>, tvsurf::Error> {
    let resolve = |id: i64| resolved.get(&id).copied().unwrap_or(id);
    match operation {
        PendingOperation::WatchProgress {
            tv_id,
            episode_id,
            time,
        } => tvsurf::tv::set_watch_progress(client, *tv_id, *episode_id, *time).await?,
        PendingOperation::TagChange { tv_id, tag } => {
            tvsurf::tv::set_tag(client, *tv_id, *tag).await?;
        }
        PendingOperation::TrackingChange { tv_id, tracking } => {
            tvsurf::tv::set_tracking(client, *tv_id, *tracking).await?;
        }
        PendingOperation::AddSeries { temp_id, name } => {
            let id = tvsurf::series::add(client, name).await?;
            debug!(temp_id, id, "series created");
            return Ok(Some((*temp_id, id)));
        }
        PendingOperation::UpdateSeriesTvs { id, tvs } => {
            tvsurf::series::update_tvs(client, resolve(*id), tvs).await?;
        }
        PendingOperation::RemoveSeries { id } => {
            tvsurf::series::remove(client, resolve(*id)).await?;
        }
    }
    Ok(None)
}

#[async_trait]
impl ProgressSink for OfflineStore {
    async fn persist(&mut self, tv_id: i64, episode_id: i64, time: f64) -> Result<()> {
        self.set_watch_progress(tv_id, episode_id, time)
    }
}
