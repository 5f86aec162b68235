//! Local copies of episode videos for playback without the backend.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use tvsurf::models::TvInfo;
use url::Url;

use crate::errors::{Error, Result};
use crate::storage;

pub const MAX_CONCURRENT_DOWNLOADS: usize = 3;

const CACHE_DIR: &str = "video_cache";
const INDEX_FILE: &str = "index.json";
const DEFAULT_EXTENSION: &str = "mp4";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEpisode {
    pub tv_id: i64,
    pub episode_id: i64,
    pub path: PathBuf,
    pub downloaded_at: DateTime<Utc>,
    pub size: u64,
}

/// An episode to fetch into the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeDownload {
    pub tv_id: i64,
    pub episode_id: i64,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct VideoCache {
    dir: PathBuf,
    http: reqwest::Client,
    token: Option<String>,
    index: Arc<Mutex<Vec<CachedEpisode>>>,
    permits: Arc<Semaphore>,
}

fn extension(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|url| {
            let path = url.path().to_owned();
            Path::new(&path)
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_ascii_lowercase)
        })
        .filter(|ext| !ext.is_empty() && ext.len() <= 5)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_owned())
}

impl VideoCache {
    #[must_use]
    pub fn open(data_dir: &Path, http: reqwest::Client, token: Option<String>) -> Self {
        let dir = data_dir.join(CACHE_DIR);
        let index = storage::read_json_or_default(&dir.join(INDEX_FILE));
        Self {
            dir,
            http,
            token,
            index: Arc::new(Mutex::new(index)),
            permits: Arc::new(Semaphore::new(MAX_CONCURRENT_DOWNLOADS)),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CachedEpisode>> {
        self.index
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn save(&self, index: &[CachedEpisode]) -> Result<()> {
        storage::write_json(&self.dir.join(INDEX_FILE), index)
    }

    /// Drops index entries whose file disappeared.
    fn prune(&self) -> Result<()> {
        let mut index = self.lock();
        let before = index.len();
        index.retain(|entry| entry.path.exists());
        if before != index.len() {
            debug!("dropped {} missing cache entries", before - index.len());
            self.save(&index)?;
        }
        Ok(())
    }

    /// The cached copy of an episode, if its file still exists.
    ///
    /// # Errors
    /// Returns an error if the index cannot be rewritten.
    pub fn get(&self, tv_id: i64, episode_id: i64) -> Result<Option<CachedEpisode>> {
        self.prune()?;
        Ok(self
            .lock()
            .iter()
            .find(|e| e.tv_id == tv_id && e.episode_id == episode_id)
            .cloned())
    }

    /// # Errors
    /// Returns an error if the index cannot be rewritten.
    pub fn is_cached(&self, tv_id: i64, episode_id: i64) -> Result<bool> {
        Ok(self.get(tv_id, episode_id)?.is_some())
    }

    /// # Errors
    /// Returns an error if the index cannot be rewritten.
    pub fn list(&self) -> Result<Vec<CachedEpisode>> {
        self.prune()?;
        let mut entries = self.lock().clone();
        entries.sort_by_key(|e| (e.tv_id, e.episode_id));
        Ok(entries)
    }

    /// # Errors
    /// Returns an error if the index cannot be rewritten.
    pub fn total_size(&self) -> Result<u64> {
        Ok(self.list()?.iter().map(|e| e.size).sum())
    }

    /// Fetch one episode. Returns the existing entry when already cached.
    ///
    /// # Errors
    /// [`Error::Http`]: If the request failed or returned an error status.
    /// [`Error::Io`]: If the file could not be written. Partial files are removed.
    pub async fn download(&self, episode: &EpisodeDownload) -> Result<CachedEpisode> {
        let _permit = self.permits.acquire().await?;
        if let Some(entry) = self.get(episode.tv_id, episode.episode_id)? {
            return Ok(entry);
        }
        let path = self.dir.join(format!(
            "{}_{}.{}",
            episode.tv_id,
            episode.episode_id,
            extension(&episode.url)
        ));
        let partial = path.with_extension("part");
        info!("caching tv {} episode {}", episode.tv_id, episode.episode_id);
        let size = match self.fetch(&episode.url, &partial).await {
            Ok(size) => size,
            Err(err) => {
                if let Err(cleanup) = storage::remove_file_if_exists(&partial) {
                    warn!("failed to remove partial download: {cleanup}");
                }
                return Err(err);
            }
        };
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(Error::io(&path))?;
        let entry = CachedEpisode {
            tv_id: episode.tv_id,
            episode_id: episode.episode_id,
            path,
            downloaded_at: Utc::now(),
            size,
        };
        let mut index = self.lock();
        index.retain(|e| !(e.tv_id == entry.tv_id && e.episode_id == entry.episode_id));
        index.push(entry.clone());
        self.save(&index)?;
        Ok(entry)
    }

    async fn fetch(&self, url: &str, target: &Path) -> Result<u64> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(Error::io(&self.dir))?;
        let mut request = self.http.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?.error_for_status()?;
        let mut file = File::create(target).await.map_err(Error::io(target))?;
        let mut stream = response.bytes_stream();
        let mut size = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(Error::io(target))?;
            size += chunk.len() as u64;
        }
        file.flush().await.map_err(Error::io(target))?;
        Ok(size)
    }

    /// Fetch several episodes, at most [`MAX_CONCURRENT_DOWNLOADS`] at a time.
    pub async fn download_all(&self, episodes: &[EpisodeDownload]) -> Vec<Result<CachedEpisode>> {
        futures::future::join_all(episodes.iter().map(|episode| self.download(episode))).await
    }

    /// Stops deleting at the first file that cannot be removed; entries not
    /// deleted stay in the index.
    fn remove_where(&self, predicate: impl Fn(&CachedEpisode) -> bool) -> Result<usize> {
        let mut index = self.lock();
        let mut removed = 0;
        let mut failure = None;
        index.retain(|entry| {
            if failure.is_some() || !predicate(entry) {
                return true;
            }
            match storage::remove_file_if_exists(&entry.path) {
                Ok(()) => {
                    removed += 1;
                    false
                }
                Err(err) => {
                    failure = Some(err);
                    true
                }
            }
        });
        self.save(&index)?;
        match failure {
            Some(err) => Err(err),
            None => Ok(removed),
        }
    }

    /// # Errors
    /// Returns an error if a file or the index cannot be written.
    pub fn remove(&self, tv_id: i64, episode_id: i64) -> Result<bool> {
        Ok(self.remove_where(|e| e.tv_id == tv_id && e.episode_id == episode_id)? > 0)
    }

    /// # Errors
    /// Returns an error if a file or the index cannot be written.
    pub fn remove_tv(&self, tv_id: i64) -> Result<usize> {
        self.remove_where(|e| e.tv_id == tv_id)
    }

    /// Removes episodes before each TV's current watch position.
    ///
    /// # Errors
    /// Returns an error if a file or the index cannot be written.
    pub fn clear_watched(&self, tvs: &[TvInfo]) -> Result<usize> {
        self.remove_where(|entry| {
            tvs.iter().any(|tv| {
                tv.id == entry.tv_id && entry.episode_id < tv.user_data.watch_progress.episode_id
            })
        })
    }

    /// # Errors
    /// Returns an error if a file or the index cannot be written.
    pub fn clear(&self) -> Result<usize> {
        self.remove_where(|_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_files(dir: &Path, entries: &[(i64, i64)]) -> VideoCache {
        let cache = VideoCache::open(dir, reqwest::Client::new(), None);
        std::fs::create_dir_all(cache.dir()).unwrap();
        let mut index = cache.lock();
        for (tv_id, episode_id) in entries {
            let path = cache.dir().join(format!("{tv_id}_{episode_id}.mp4"));
            std::fs::write(&path, b"0123456789").unwrap();
            index.push(CachedEpisode {
                tv_id: *tv_id,
                episode_id: *episode_id,
                path,
                downloaded_at: Utc::now(),
                size: 10,
            });
        }
        drop(index);
        cache
    }

    fn tv(id: i64, episode_id: i64) -> TvInfo {
        serde_json::from_value(serde_json::json!({
            "id": id, "name": "Show", "cover_url": "", "series": [],
            "last_update": "2024-01-01T00:00:00", "total_episodes": 5,
            "user_data": {
                "tv_id": id, "tag": "watching",
                "watch_progress": {"episode_id": episode_id, "time": 0},
                "last_update": "2024-01-01T00:00:00"
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("http://nas/video/1/0.MKV?token=1"), "mkv");
        assert_eq!(extension("http://nas/video/1/0"), "mp4");
        assert_eq!(extension("not a url"), "mp4");
    }

    #[test]
    fn test_queries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with_files(dir.path(), &[(1, 0), (1, 1), (2, 0)]);
        assert!(cache.is_cached(1, 1).unwrap());
        assert!(!cache.is_cached(1, 2).unwrap());
        assert_eq!(cache.total_size().unwrap(), 30);
        assert_eq!(cache.list().unwrap().len(), 3);
    }

    #[test]
    fn test_missing_file_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with_files(dir.path(), &[(1, 0)]);
        std::fs::remove_file(cache.dir().join("1_0.mp4")).unwrap();
        assert!(!cache.is_cached(1, 0).unwrap());
        assert!(cache.list().unwrap().is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with_files(dir.path(), &[(1, 0), (1, 1), (1, 2), (2, 0), (2, 1)]);

        assert!(cache.remove(2, 1).unwrap());
        assert!(!cache.remove(2, 1).unwrap());
        assert!(!cache.dir().join("2_1.mp4").exists());

        assert_eq!(cache.clear_watched(&[tv(1, 2), tv(2, 0)]).unwrap(), 2);
        let left: Vec<(i64, i64)> = cache
            .list()
            .unwrap()
            .iter()
            .map(|e| (e.tv_id, e.episode_id))
            .collect();
        assert_eq!(left, [(1, 2), (2, 0)]);

        assert_eq!(cache.remove_tv(1).unwrap(), 1);
        assert_eq!(cache.clear().unwrap(), 1);
        assert_eq!(cache.total_size().unwrap(), 0);
    }

    #[test]
    fn test_failed_removal_keeps_index() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with_files(dir.path(), &[(1, 0), (1, 1), (1, 2)]);
        let blocked = cache.dir().join("1_1.mp4");
        std::fs::remove_file(&blocked).unwrap();
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("keep"), b"x").unwrap();

        assert!(matches!(cache.remove_tv(1), Err(Error::Io { .. })));

        let left: Vec<(i64, i64)> = cache
            .list()
            .unwrap()
            .iter()
            .map(|e| (e.tv_id, e.episode_id))
            .collect();
        assert_eq!(left, [(1, 1), (1, 2)]);
        let reopened = VideoCache::open(dir.path(), reqwest::Client::new(), None);
        assert_eq!(reopened.list().unwrap().len(), 2);
    }

    #[test]
    fn test_index_persists() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with_files(dir.path(), &[(1, 0), (1, 1)]);
        cache.remove(1, 0).unwrap();

        let reopened = VideoCache::open(dir.path(), reqwest::Client::new(), None);
        assert_eq!(reopened.list().unwrap().len(), 1);
    }
}
