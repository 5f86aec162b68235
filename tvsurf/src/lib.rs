pub mod models;
pub mod password;
pub mod units;
pub mod timestamp;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

const API_PREFIX: &str = "api";

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    token: Option<String>,
    reqwest: reqwest::Client,
}

impl Client {
    #[must_use]
    pub fn new(base_url: Url, reqwest: reqwest::Client) -> Self {
        Client {
            base_url,
            token: None,
            reqwest,
        }
    }

    /// Attach a bearer token that is sent with every request.
    #[must_use]
    pub fn with_token<S: Into<String>>(mut self, token: S) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn endpoint(&self, name: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(format!("{base}/{API_PREFIX}/{name}").parse()?)
    }

    async fn send<R: Serialize + ?Sized>(
        &self,
        name: &str,
        request: &R,
    ) -> Result<reqwest::Response, Error> {
        let url = self.endpoint(name)?;
        tracing::debug!("POST {}", url);
        let mut builder = self.reqwest.post(url).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder.send().await?)
    }

    pub(crate) async fn post<R, T>(&self, name: &str, request: &R) -> Result<T, Error>
    where
        R: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(name, request).await?;
        handle_response(response).await
    }

    /// Calls an endpoint whose response body carries no information.
    pub(crate) async fn post_unit<R>(&self, name: &str, request: &R) -> Result<(), Error>
    where
        R: Serialize + ?Sized,
    {
        let response = self.send(name, request).await?;
        check_status(response).await.map(|_| ())
    }

    /// Resolve a backend-relative resource path against the base url.
    #[must_use]
    pub fn absolute_url(&self, url: &str) -> String {
        absolute_url(&self.base_url, url)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("API error: {status} - {body}")]
    Status { status: StatusCode, body: String },
    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),
    #[error(transparent)]
    DeserializationError(#[from] serde_json::Error),
    #[error("failed to hash password: {0}")]
    Password(#[from] password::PasswordError),
}

impl Error {
    /// Whether the backend rejected the session token.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized)
    }
}

async fn check_status(res: reqwest::Response) -> Result<String, Error> {
    let status = res.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Unauthorized);
    }
    let body = res.text().await?;
    if !status.is_success() {
        return Err(Error::Status { status, body });
    }
    Ok(body)
}

async fn handle_response<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, Error> {
    let body = check_status(res).await?;
    match serde_json::from_str(&body) {
        Ok(response) => Ok(response),
        Err(e) => {
            tracing::trace!(body = body, "error deserializing response: {}", e);
            Err(Error::DeserializationError(e))
        }
    }
}

/// Joins `url` onto `base` unless it is already absolute.
#[must_use]
pub fn absolute_url(base: &Url, url: &str) -> String {
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        return url.to_owned();
    }
    let base = base.as_str().trim_end_matches('/');
    let path = url.trim_start_matches('/');
    format!("{base}/{path}")
}

pub mod tv {
    use serde::{Deserialize, Serialize};

    use crate::models::{Source, SourceUrl, Tag, TvDetails, TvInfo};
    use crate::{Client, Error};

    #[derive(Debug, Clone, Serialize)]
    struct IdsRequest<'a> {
        ids: Option<&'a [i64]>,
    }

    #[derive(Debug, Clone, Deserialize)]
    struct InfosResponse {
        tvs: Vec<TvInfo>,
    }

    #[derive(Debug, Clone, Deserialize)]
    struct MultipleDetailsResponse {
        tv_details: Vec<TvDetails>,
    }

    #[derive(Debug, Clone, Serialize)]
    struct IdRequest {
        id: i64,
    }

    #[derive(Debug, Clone, Serialize)]
    struct SetTagRequest {
        tv_id: i64,
        tag: Tag,
    }

    #[derive(Debug, Clone, Serialize)]
    struct SearchRequest<'a> {
        keyword: &'a str,
    }

    /// Aggregated search result. Sources that failed are listed next to the
    /// ones that answered.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct SearchResult {
        pub source: Vec<Source>,
        #[serde(default)]
        pub search_error: Vec<crate::models::SearchError>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct NewTv {
        pub name: String,
        pub source: Source,
        pub tracking: bool,
        pub series: Vec<i64>,
    }

    #[derive(Debug, Clone, Deserialize)]
    struct IdResponse {
        id: i64,
    }

    #[derive(Debug, Clone, Serialize)]
    struct WatchProgressRequest {
        tv_id: i64,
        episode_id: i64,
        time: f64,
    }

    #[derive(Debug, Clone, Serialize)]
    struct TrackingRequest {
        tv_id: i64,
        tracking: bool,
    }

    #[derive(Debug, Clone, Serialize)]
    struct UpdateSourceRequest<'a> {
        id: i64,
        source: &'a Source,
    }

    #[derive(Debug, Clone, Serialize)]
    struct UpdateEpisodeSourceRequest<'a> {
        tv_id: i64,
        episode_id: i64,
        source: &'a SourceUrl,
    }

    #[derive(Debug, Clone, Serialize)]
    struct ScheduleRequest<'a> {
        tv_id: i64,
        episode_ids: &'a [i64],
    }

    /// List TV summaries, optionally restricted to `ids`.
    ///
    /// # Errors
    /// [`Error::Unauthorized`]: If the session is not authorized.
    /// [`Error::Status`]: If the backend rejected the request.
    pub async fn infos(client: &Client, ids: Option<&[i64]>) -> Result<Vec<TvInfo>, Error> {
        let response: InfosResponse = client.post("get_tv_infos", &IdsRequest { ids }).await?;
        Ok(response
            .tvs
            .into_iter()
            .map(|tv| tv.with_base_url(client.base_url()))
            .collect())
    }

    /// Full TV record with playable episode URLs.
    ///
    /// # Errors
    /// [`Error::Status`]: If the TV does not exist or the request failed.
    pub async fn details(client: &Client, id: i64) -> Result<TvDetails, Error> {
        let response: TvDetails = client.post("get_tv_details", &IdRequest { id }).await?;
        Ok(response.with_base_url(client.base_url()))
    }

    /// Details of several TVs in one round trip.
    ///
    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn multiple_details(
        client: &Client,
        ids: Option<&[i64]>,
    ) -> Result<Vec<TvDetails>, Error> {
        let response: MultipleDetailsResponse = client
            .post("get_multiple_tv_details", &IdsRequest { ids })
            .await?;
        Ok(response
            .tv_details
            .into_iter()
            .map(|d| d.with_base_url(client.base_url()))
            .collect())
    }

    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn set_tag(client: &Client, tv_id: i64, tag: Tag) -> Result<(), Error> {
        client
            .post_unit("set_tv_tag", &SetTagRequest { tv_id, tag })
            .await
    }

    /// Search every configured source for `keyword`.
    ///
    /// # Errors
    /// [`Error::Status`]: If the search request itself failed. Failures of
    /// individual sources are reported in [`SearchResult::search_error`].
    pub async fn search(client: &Client, keyword: &str) -> Result<SearchResult, Error> {
        client.post("search_tv", &SearchRequest { keyword }).await
    }

    /// Register a TV from a search result and return its id.
    ///
    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn add(client: &Client, tv: &NewTv) -> Result<i64, Error> {
        let response: IdResponse = client.post("add_tv", tv).await?;
        Ok(response.id)
    }

    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn set_watch_progress(
        client: &Client,
        tv_id: i64,
        episode_id: i64,
        time: f64,
    ) -> Result<(), Error> {
        let request = WatchProgressRequest {
            tv_id,
            episode_id,
            time,
        };
        client.post_unit("set_watch_progress", &request).await
    }

    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn set_tracking(client: &Client, tv_id: i64, tracking: bool) -> Result<(), Error> {
        client
            .post_unit("set_tv_tracking", &TrackingRequest { tv_id, tracking })
            .await
    }

    /// Replace the source of a whole TV.
    ///
    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn update_source(client: &Client, id: i64, source: &Source) -> Result<(), Error> {
        client
            .post_unit("update_tv_source", &UpdateSourceRequest { id, source })
            .await
    }

    /// Replace the source of a single episode.
    ///
    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn update_episode_source(
        client: &Client,
        tv_id: i64,
        episode_id: i64,
        source: &SourceUrl,
    ) -> Result<(), Error> {
        let request = UpdateEpisodeSourceRequest {
            tv_id,
            episode_id,
            source,
        };
        client.post_unit("update_episode_series", &request).await
    }

    /// Ask the backend to (re)download the given episodes.
    ///
    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn schedule_episode_download(
        client: &Client,
        tv_id: i64,
        episode_ids: &[i64],
    ) -> Result<(), Error> {
        let request = ScheduleRequest { tv_id, episode_ids };
        client.post_unit("schedule_episode_download", &request).await
    }

    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn remove(client: &Client, id: i64) -> Result<(), Error> {
        client.post_unit("remove_tv", &IdRequest { id }).await
    }
}

pub mod series {
    use serde::{Deserialize, Serialize};

    use crate::models::Series;
    use crate::{Client, Error};

    #[derive(Debug, Clone, Serialize)]
    struct ListRequest<'a> {
        ids: Option<&'a [i64]>,
    }

    #[derive(Debug, Clone, Deserialize)]
    struct ListResponse {
        series: Vec<Series>,
    }

    #[derive(Debug, Clone, Serialize)]
    struct AddRequest<'a> {
        name: &'a str,
    }

    #[derive(Debug, Clone, Deserialize)]
    struct AddResponse {
        id: i64,
    }

    #[derive(Debug, Clone, Serialize)]
    struct UpdateTvsRequest<'a> {
        id: i64,
        tvs: &'a [i64],
    }

    #[derive(Debug, Clone, Serialize)]
    struct RemoveRequest {
        id: i64,
    }

    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn list(client: &Client, ids: Option<&[i64]>) -> Result<Vec<Series>, Error> {
        let response: ListResponse = client.post("get_series", &ListRequest { ids }).await?;
        Ok(response.series)
    }

    /// Create an empty series and return its id.
    ///
    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn add(client: &Client, name: &str) -> Result<i64, Error> {
        let response: AddResponse = client.post("add_series", &AddRequest { name }).await?;
        Ok(response.id)
    }

    /// Replace the ordered TV list of a series.
    ///
    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn update_tvs(client: &Client, id: i64, tvs: &[i64]) -> Result<(), Error> {
        client
            .post_unit("update_series_tvs", &UpdateTvsRequest { id, tvs })
            .await
    }

    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn remove(client: &Client, id: i64) -> Result<(), Error> {
        client.post_unit("remove_series", &RemoveRequest { id }).await
    }
}

pub mod download {
    use serde::{Deserialize, Serialize};

    use crate::models::{DownloadProgressWithName, Monitor};
    use crate::{Client, Error};

    #[derive(Debug, Clone, Copy, Default, Serialize)]
    struct EmptyRequest {}

    #[derive(Debug, Clone, Deserialize)]
    struct ProgressResponse {
        #[serde(default)]
        progress: Vec<DownloadProgressWithName>,
    }

    /// Snapshot of the downloads currently known to the backend.
    ///
    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn progress(client: &Client) -> Result<Vec<DownloadProgressWithName>, Error> {
        let response: ProgressResponse = client
            .post("get_download_progress", &EmptyRequest {})
            .await?;
        Ok(response.progress)
    }

    /// Active download and error counters.
    ///
    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn monitor(client: &Client) -> Result<Monitor, Error> {
        client.post("get_monitor", &EmptyRequest {}).await
    }
}

pub mod errors {
    use serde::{Deserialize, Serialize};

    use crate::models::ErrorRecord;
    use crate::{Client, Error};

    #[derive(Debug, Clone, Copy, Default, Serialize)]
    struct EmptyRequest {}

    #[derive(Debug, Clone, Deserialize)]
    struct ListResponse {
        #[serde(default)]
        errors: Vec<ErrorRecord>,
    }

    #[derive(Debug, Clone, Serialize)]
    struct RemoveRequest<'a> {
        ids: &'a [i64],
    }

    /// Errors recorded by background jobs.
    ///
    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn list(client: &Client) -> Result<Vec<ErrorRecord>, Error> {
        let response: ListResponse = client.post("get_errors", &EmptyRequest {}).await?;
        Ok(response.errors)
    }

    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn remove(client: &Client, ids: &[i64]) -> Result<(), Error> {
        client.post_unit("remove_errors", &RemoveRequest { ids }).await
    }
}

pub mod config {
    use serde::{Deserialize, Serialize};

    use crate::models::Config;
    use crate::{Client, Error};

    #[derive(Debug, Clone, Copy, Default, Serialize)]
    struct EmptyRequest {}

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct ConfigEnvelope<C> {
        config: C,
    }

    /// # Errors
    /// [`Error::Status`]: If the request failed.
    /// [`Error::DeserializationError`]: If the config does not match the expected format.
    pub async fn get(client: &Client) -> Result<Config, Error> {
        let response: ConfigEnvelope<Config> = client.post("get_config", &EmptyRequest {}).await?;
        Ok(response.config)
    }

    /// # Errors
    /// [`Error::Status`]: If the backend refused the config.
    pub async fn set(client: &Client, config: &Config) -> Result<(), Error> {
        client
            .post_unit("set_config", &ConfigEnvelope { config })
            .await
    }
}

pub mod user {
    use serde::{Deserialize, Serialize};

    use crate::models::{UserInfo, Users, Whoami};
    use crate::password::hash_password;
    use crate::{Client, Error};

    #[derive(Debug, Clone, Copy, Default, Serialize)]
    struct EmptyRequest {}

    #[derive(Debug, Clone, Serialize)]
    struct LoginRequest<'a> {
        username: &'a str,
        password_hash: &'a str,
    }

    #[derive(Debug, Clone, Deserialize)]
    struct LoginResponse {
        token: String,
    }

    #[derive(Debug, Clone, Serialize)]
    struct AddRequest<'a> {
        username: &'a str,
        password_hash: &'a str,
        group: &'a [String],
    }

    #[derive(Debug, Clone, Serialize)]
    struct UsernameRequest<'a> {
        username: &'a str,
    }

    #[derive(Debug, Clone, Serialize)]
    struct GroupRequest<'a> {
        username: &'a str,
        group: &'a [String],
    }

    #[derive(Debug, Clone, Serialize)]
    struct PasswordRequest<'a> {
        username: &'a str,
        password_hash: &'a str,
    }

    #[derive(Debug, Clone, Serialize)]
    struct MyPasswordRequest<'a> {
        password_hash: &'a str,
    }

    /// Exchange credentials for a session token. The password is hashed
    /// before it leaves the process.
    ///
    /// # Errors
    /// [`Error::Unauthorized`]: If the credentials were rejected.
    pub async fn login(client: &Client, username: &str, password: &str) -> Result<String, Error> {
        let username = username.trim();
        let password_hash = hash_password(password, username)?;
        let request = LoginRequest {
            username,
            password_hash: &password_hash,
        };
        let response: LoginResponse = client.post("login", &request).await?;
        Ok(response.token)
    }

    /// # Errors
    /// [`Error::Unauthorized`]: If the session is not valid.
    pub async fn whoami(client: &Client) -> Result<Whoami, Error> {
        client.post("whoami", &EmptyRequest {}).await
    }

    /// # Errors
    /// [`Error::Status`]: If the caller is not an administrator.
    pub async fn list(client: &Client) -> Result<Users, Error> {
        client.post("get_users", &EmptyRequest {}).await
    }

    /// # Errors
    /// [`Error::Status`]: If the user exists or the request failed.
    pub async fn add(client: &Client, user: &UserInfo, password: &str) -> Result<(), Error> {
        let username = user.username.trim();
        let password_hash = hash_password(password, username)?;
        let request = AddRequest {
            username,
            password_hash: &password_hash,
            group: &user.group,
        };
        client.post_unit("add_user", &request).await
    }

    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn remove(client: &Client, username: &str) -> Result<(), Error> {
        client
            .post_unit("remove_user", &UsernameRequest { username })
            .await
    }

    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn update_group(client: &Client, username: &str, group: &[String]) -> Result<(), Error> {
        client
            .post_unit("update_user_group", &GroupRequest { username, group })
            .await
    }

    /// Reset the password of another user.
    ///
    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn set_password(client: &Client, username: &str, password: &str) -> Result<(), Error> {
        let password_hash = hash_password(password, username)?;
        let request = PasswordRequest {
            username,
            password_hash: &password_hash,
        };
        client.post_unit("set_user_password", &request).await
    }

    /// Change the password of the logged in user.
    ///
    /// # Errors
    /// [`Error::Status`]: If the request failed.
    pub async fn set_my_password(client: &Client, username: &str, password: &str) -> Result<(), Error> {
        let password_hash = hash_password(password, username)?;
        client
            .post_unit(
                "set_my_password",
                &MyPasswordRequest {
                    password_hash: &password_hash,
                },
            )
            .await
    }
}
