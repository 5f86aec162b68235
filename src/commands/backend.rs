use async_trait::async_trait;
use tvsurf::models::{Series, Tag, TvDetails, TvInfo, Whoami};

use crate::errors::{Error, Result};
use crate::offline::OfflineStore;
use crate::playback::ProgressSink;
use crate::state::AppState;

/// Where library reads and writes go: the server, or the offline snapshot.
#[derive(Debug)]
pub enum Backend {
    Online(tvsurf::Client),
    Offline(OfflineStore),
}

impl Backend {
    /// # Errors
    /// [`Error::NotLoggedIn`]: If online and no server is configured.
    pub fn open(state: &AppState) -> Result<Self> {
        let store = OfflineStore::open(state.data_dir());
        if store.is_offline() {
            return Ok(Backend::Offline(store));
        }
        Ok(Backend::Online(state.client()?))
    }

    /// The online client, for operations that need the server.
    ///
    /// # Errors
    /// [`Error::OfflineUnsupported`]: If offline mode is active.
    pub fn online(&self, feature: &'static str) -> Result<&tvsurf::Client> {
        match self {
            Backend::Online(client) => Ok(client),
            Backend::Offline(_) => Err(Error::OfflineUnsupported(feature)),
        }
    }

    #[must_use]
    pub fn is_offline(&self) -> bool {
        matches!(self, Backend::Offline(_))
    }

    pub async fn whoami(&self) -> Result<Whoami> {
        match self {
            Backend::Online(client) => Ok(tvsurf::user::whoami(client).await?),
            Backend::Offline(store) => store.whoami().cloned().ok_or(Error::NotLoggedIn),
        }
    }

    pub async fn tv_infos(&self, ids: Option<&[i64]>) -> Result<Vec<TvInfo>> {
        match self {
            Backend::Online(client) => Ok(tvsurf::tv::infos(client, ids).await?),
            Backend::Offline(store) => Ok(store.tv_infos(ids)),
        }
    }

    pub async fn tv_details(&self, id: i64) -> Result<TvDetails> {
        match self {
            Backend::Online(client) => Ok(tvsurf::tv::details(client, id).await?),
            Backend::Offline(store) => store.tv_details(id),
        }
    }

    pub async fn series(&self, ids: Option<&[i64]>) -> Result<Vec<Series>> {
        match self {
            Backend::Online(client) => Ok(tvsurf::series::list(client, ids).await?),
            Backend::Offline(store) => Ok(store.series(ids)),
        }
    }

    /// # Errors
    /// [`Error::SeriesNotFound`]: If there is no series with this id.
    pub async fn single_series(&self, id: i64) -> Result<Series> {
        self.series(Some(&[id]))
            .await?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or(Error::SeriesNotFound(id))
    }

    pub async fn set_tag(&mut self, tv_id: i64, tag: Tag) -> Result<()> {
        match self {
            Backend::Online(client) => Ok(tvsurf::tv::set_tag(client, tv_id, tag).await?),
            Backend::Offline(store) => store.set_tag(tv_id, tag),
        }
    }

    pub async fn set_tracking(&mut self, tv_id: i64, tracking: bool) -> Result<()> {
        match self {
            Backend::Online(client) => {
                Ok(tvsurf::tv::set_tracking(client, tv_id, tracking).await?)
            }
            Backend::Offline(store) => store.set_tracking(tv_id, tracking),
        }
    }

    pub async fn set_watch_progress(&mut self, tv_id: i64, episode_id: i64, time: f64) -> Result<()> {
        match self {
            Backend::Online(client) => {
                Ok(tvsurf::tv::set_watch_progress(client, tv_id, episode_id, time).await?)
            }
            Backend::Offline(store) => store.set_watch_progress(tv_id, episode_id, time),
        }
    }

    /// Returns the new id, negative when created offline.
    pub async fn add_series(&mut self, name: &str) -> Result<i64> {
        match self {
            Backend::Online(client) => Ok(tvsurf::series::add(client, name).await?),
            Backend::Offline(store) => store.add_series(name),
        }
    }

    pub async fn update_series_tvs(&mut self, id: i64, tvs: &[i64]) -> Result<()> {
        match self {
            Backend::Online(client) => Ok(tvsurf::series::update_tvs(client, id, tvs).await?),
            Backend::Offline(store) => store.update_series_tvs(id, tvs),
        }
    }

    pub async fn remove_series(&mut self, id: i64) -> Result<()> {
        match self {
            Backend::Online(client) => Ok(tvsurf::series::remove(client, id).await?),
            Backend::Offline(store) => store.remove_series(id),
        }
    }
}

#[async_trait]
impl ProgressSink for Backend {
    async fn persist(&mut self, tv_id: i64, episode_id: i64, time: f64) -> Result<()> {
        self.set_watch_progress(tv_id, episode_id, time).await
    }
}
