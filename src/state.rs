use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::errors::{Error, Result};
use crate::storage;

const SESSION_FILE: &str = "session.json";
const USER_AGENT: &str = concat!("tvsurf-cli/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overrides read from `TVSURF_*` environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub base_url: Option<Url>,
    pub token: Option<String>,
    pub data_dir: Option<PathBuf>,
}

impl Settings {
    /// # Errors
    /// Returns an error if a variable is set but malformed.
    pub fn from_env() -> Result<Self> {
        Ok(envy::prefixed("TVSURF_").from_env()?)
    }
}

/// Login state saved by `tvsurf login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub base_url: Url,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub settings: Settings,
    pub session: Option<Session>,
    pub http: reqwest::Client,
}

impl AppState {
    /// Load settings from the environment and the saved session.
    ///
    /// # Errors
    /// Returns an error if the environment is malformed or the HTTP client
    /// cannot be created.
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        Self::with_settings(Settings::from_env()?, data_dir)
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_settings(settings: Settings, data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = data_dir
            .or_else(|| settings.data_dir.clone())
            .unwrap_or_else(default_data_dir);
        let session = storage::read_json_or_default(&data_dir.join(SESSION_FILE));
        debug!("using data directory {}", data_dir.display());
        Ok(Self {
            data_dir,
            settings,
            session,
            http: create_reqwest_client()?,
        })
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Environment first, then the saved session.
    #[must_use]
    pub fn base_url(&self) -> Option<&Url> {
        self.settings
            .base_url
            .as_ref()
            .or(self.session.as_ref().map(|s| &s.base_url))
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.settings
            .token
            .as_deref()
            .or(self.session.as_ref().and_then(|s| s.token.as_deref()))
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.session.as_ref().and_then(|s| s.username.as_deref())
    }

    /// An unauthenticated client for `base_url`.
    #[must_use]
    pub fn client_for(&self, base_url: Url) -> tvsurf::Client {
        tvsurf::Client::new(base_url, self.http.clone())
    }

    /// # Errors
    /// [`Error::NotLoggedIn`]: If no backend url is known.
    pub fn client(&self) -> Result<tvsurf::Client> {
        let base_url = self.base_url().ok_or(Error::NotLoggedIn)?.clone();
        let client = self.client_for(base_url);
        Ok(match self.token() {
            Some(token) => client.with_token(token),
            None => client,
        })
    }

    /// # Errors
    /// Returns an error if the session file cannot be written.
    pub fn save_session(&mut self, session: Session) -> Result<()> {
        storage::write_json(&self.data_dir.join(SESSION_FILE), &session)?;
        self.session = Some(session);
        Ok(())
    }

    /// Forget the saved session. Returns whether there was one.
    ///
    /// # Errors
    /// Returns an error if the session file cannot be removed.
    pub fn clear_session(&mut self) -> Result<bool> {
        storage::remove_file_if_exists(&self.data_dir.join(SESSION_FILE))?;
        Ok(self.session.take().is_some())
    }
}

pub(crate) fn create_reqwest_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?)
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tvsurf")
}
