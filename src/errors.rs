use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] tvsurf::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Env(#[from] envy::Error),
    #[error(transparent)]
    Config(#[from] tvsurf::models::ConfigKeyError),
    #[error(transparent)]
    Acquire(#[from] tokio::sync::AcquireError),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("not logged in, run `tvsurf login --server <url>` first")]
    NotLoggedIn,
    #[error("already in offline mode")]
    AlreadyOffline,
    #[error("not in offline mode")]
    NotOffline,
    #[error("{0} is not available in offline mode")]
    OfflineUnsupported(&'static str),
    #[error("tv {0} not found")]
    TvNotFound(i64),
    #[error("series {0} not found")]
    SeriesNotFound(i64),
    #[error("tv {tv_id} has no episode {episode_id}")]
    EpisodeNotFound { tv_id: i64, episode_id: i64 },
    #[error("episode {episode_id} of tv {tv_id} is not downloaded yet")]
    EpisodeNotDownloaded { tv_id: i64, episode_id: i64 },
    #[error("no search result #{0}")]
    NoSearchResult(usize),
    #[error("invalid username {0:?}, use letters, digits, '_' or '-'")]
    InvalidUsername(String),
    #[error("sync stopped at {operation}: {source}")]
    Sync {
        operation: String,
        #[source]
        source: tvsurf::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type InternalError = anyhow::Error;
