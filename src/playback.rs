//! Watch progress synchronisation for a playing TV.
//!
//! A [`PlaybackSession`] follows player events and writes the position to a
//! [`ProgressSink`]: at most once per [`PERSIST_INTERVAL`] while playing, and
//! right away on pause, seek, episode switch and episode end. Sink failures
//! are logged and never interrupt playback.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};
use tvsurf::models::TvDetails;

use crate::errors::Result;

pub const PERSIST_INTERVAL: Duration = Duration::from_secs(5);

#[async_trait]
pub trait ProgressSink: Send {
    async fn persist(&mut self, tv_id: i64, episode_id: i64, time: f64) -> Result<()>;
}

#[async_trait]
impl ProgressSink for tvsurf::Client {
    async fn persist(&mut self, tv_id: i64, episode_id: i64, time: f64) -> Result<()> {
        tvsurf::tv::set_watch_progress(self, tv_id, episode_id, time).await?;
        Ok(())
    }
}

#[async_trait]
impl<S: ProgressSink> ProgressSink for &mut S {
    async fn persist(&mut self, tv_id: i64, episode_id: i64, time: f64) -> Result<()> {
        (**self).persist(tv_id, episode_id, time).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ended {
    /// Moved on to the next episode. `url` is `None` while it is not downloaded.
    Next { episode: usize, url: Option<String> },
    Finished,
}

#[derive(Debug)]
pub struct PlaybackSession<S> {
    sink: S,
    tv_id: i64,
    episode_count: usize,
    urls: Vec<Option<String>>,
    episode: usize,
    position: f64,
    last_persist: Instant,
    finished: bool,
}

fn episode_id(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}

impl<S: ProgressSink> PlaybackSession<S> {
    /// Starts at the stored watch progress, or at the first episode when
    /// nothing was watched yet.
    pub fn open(details: &TvDetails, sink: S) -> Self {
        let progress = details.info.user_data.watch_progress;
        let episode_count = details.tv.source.episodes.len();
        let (episode, position) = match usize::try_from(progress.episode_id) {
            Ok(episode) => (episode, progress.time.max(0.0)),
            Err(_) => (0, 0.0),
        };
        Self {
            sink,
            tv_id: details.tv.id,
            episode_count,
            urls: details.episodes.clone(),
            episode,
            position,
            last_persist: Instant::now(),
            finished: episode >= episode_count,
        }
    }

    #[must_use]
    pub fn tv_id(&self) -> i64 {
        self.tv_id
    }

    #[must_use]
    pub fn episode(&self) -> usize {
        self.episode
    }

    #[must_use]
    pub fn position(&self) -> f64 {
        self.position
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.urls.get(self.episode).and_then(|u| u.as_deref())
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Replace the playable url of an episode, e.g. with a cached local file.
    pub fn set_url(&mut self, episode: usize, url: String) {
        if episode >= self.urls.len() {
            self.urls.resize(episode + 1, None);
        }
        self.urls[episode] = Some(url);
    }

    async fn persist(&mut self, episode: usize, time: f64) {
        self.last_persist = Instant::now();
        let episode_id = episode_id(episode);
        debug!(tv_id = self.tv_id, episode_id, time, "persisting watch progress");
        if let Err(err) = self.sink.persist(self.tv_id, episode_id, time).await {
            warn!("failed to save watch progress of tv {}: {err}", self.tv_id);
        }
    }

    /// Records the player position. Returns whether it was persisted.
    pub async fn time_update(&mut self, time: f64) -> bool {
        self.position = time;
        if self.last_persist.elapsed() < PERSIST_INTERVAL {
            return false;
        }
        self.persist(self.episode, time).await;
        true
    }

    pub async fn pause(&mut self) {
        self.persist(self.episode, self.position).await;
    }

    pub async fn seeked(&mut self, time: f64) {
        self.position = time;
        self.persist(self.episode, time).await;
    }

    /// Persists `(episode, 0)` and switches to it when it is playable.
    /// Returns whether the switch happened.
    pub async fn select_episode(&mut self, episode: usize) -> bool {
        self.persist(episode, 0.0).await;
        if self.urls.get(episode).and_then(Option::as_ref).is_none() {
            return false;
        }
        self.episode = episode;
        self.position = 0.0;
        self.finished = false;
        true
    }

    /// Marks the current episode as done and advances.
    pub async fn ended(&mut self) -> Ended {
        let next = self.episode + 1;
        self.persist(next, 0.0).await;
        self.position = 0.0;
        if next >= self.episode_count {
            self.episode = next;
            self.finished = true;
            return Ended::Finished;
        }
        self.episode = next;
        Ended::Next {
            episode: next,
            url: self.url().map(ToOwned::to_owned),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::errors::Error;

    #[derive(Debug, Clone, Default)]
    struct Recorder {
        writes: Arc<Mutex<Vec<(i64, i64, f64)>>>,
        fail: bool,
    }

    impl Recorder {
        fn writes(&self) -> Vec<(i64, i64, f64)> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProgressSink for Recorder {
        async fn persist(&mut self, tv_id: i64, episode_id: i64, time: f64) -> Result<()> {
            self.writes.lock().unwrap().push((tv_id, episode_id, time));
            if self.fail {
                return Err(Error::NotLoggedIn);
            }
            Ok(())
        }
    }

    fn details(urls: &[Option<&str>], episode_id: i64, time: f64) -> TvDetails {
        let source_url = json!({"source_key": "k", "source_name": "n", "channel_name": "c", "url": "u"});
        let episodes: Vec<_> = urls
            .iter()
            .map(|_| json!({"source": source_url, "name": "ep"}))
            .collect();
        serde_json::from_value(json!({
            "tv": {
                "id": 9, "name": "Show",
                "source": {"source": source_url, "name": "Show", "cover_url": "", "episodes": episodes},
                "storage": {"directory": "show", "episodes": [], "cover": ""},
                "track": {"tracking": true, "latest_update": "2024-01-01T00:00:00"},
                "series": []
            },
            "info": {
                "id": 9, "name": "Show", "cover_url": "", "series": [],
                "last_update": "2024-01-01T00:00:00", "total_episodes": urls.len(),
                "user_data": {
                    "tv_id": 9, "tag": "watching",
                    "watch_progress": {"episode_id": episode_id, "time": time},
                    "last_update": "2024-01-01T00:00:00"
                }
            },
            "episodes": urls
        }))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_from_stored_progress() {
        let session = PlaybackSession::open(
            &details(&[Some("a"), Some("b")], 1, 73.0),
            Recorder::default(),
        );
        assert_eq!(session.episode(), 1);
        assert!((session.position() - 73.0).abs() < f64::EPSILON);
        assert_eq!(session.url(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_progress_starts_at_beginning() {
        let session = PlaybackSession::open(&details(&[Some("a")], -1, 10.0), Recorder::default());
        assert_eq!(session.episode(), 0);
        assert!(session.position().abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_update_throttled() {
        let recorder = Recorder::default();
        let mut session =
            PlaybackSession::open(&details(&[Some("a")], 0, 0.0), recorder.clone());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!session.time_update(2.0).await);
        tokio::time::advance(Duration::from_millis(2999)).await;
        assert!(!session.time_update(4.9).await);
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(session.time_update(5.0).await);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!session.time_update(6.0).await);

        assert_eq!(recorder.writes(), [(9, 0, 5.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_seek_persist_and_reset_window() {
        let recorder = Recorder::default();
        let mut session =
            PlaybackSession::open(&details(&[Some("a")], 0, 0.0), recorder.clone());

        tokio::time::advance(Duration::from_secs(4)).await;
        session.time_update(4.0).await;
        session.pause().await;
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!session.time_update(8.0).await);
        session.seeked(120.0).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(session.time_update(125.0).await);

        assert_eq!(
            recorder.writes(),
            [(9, 0, 4.0), (9, 0, 120.0), (9, 0, 125.0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_episode() {
        let recorder = Recorder::default();
        let mut session =
            PlaybackSession::open(&details(&[Some("a"), None, Some("c")], 0, 30.0), recorder.clone());

        assert!(!session.select_episode(1).await);
        assert_eq!(session.episode(), 0);
        assert!(session.select_episode(2).await);
        assert_eq!(session.episode(), 2);
        assert!(session.position().abs() < f64::EPSILON);

        assert_eq!(recorder.writes(), [(9, 1, 0.0), (9, 2, 0.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_advances_then_finishes() {
        let recorder = Recorder::default();
        let mut session =
            PlaybackSession::open(&details(&[Some("a"), None], 0, 0.0), recorder.clone());

        assert_eq!(
            session.ended().await,
            Ended::Next {
                episode: 1,
                url: None
            }
        );
        session.set_url(1, "/tmp/1.mp4".to_owned());
        assert_eq!(session.url(), Some("/tmp/1.mp4"));
        assert_eq!(session.ended().await, Ended::Finished);
        assert!(session.is_finished());

        assert_eq!(recorder.writes(), [(9, 1, 0.0), (9, 2, 0.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failure_is_not_fatal() {
        let recorder = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let mut session =
            PlaybackSession::open(&details(&[Some("a"), Some("b")], 0, 0.0), recorder.clone());

        session.pause().await;
        assert!(matches!(session.ended().await, Ended::Next { episode: 1, .. }));
        assert_eq!(recorder.writes().len(), 2);
    }
}
