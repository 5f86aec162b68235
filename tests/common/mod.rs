#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use url::Url;

#[derive(Default)]
struct Backend {
    responses: HashMap<String, (StatusCode, String)>,
    files: HashMap<String, Vec<u8>>,
    calls: Vec<(String, Value)>,
}

type Shared = Arc<Mutex<Backend>>;

/// Fake tvsurf server: JSON endpoints under `/api` and static files under
/// `/files`.
pub struct Server {
    pub base_url: Url,
    state: Shared,
}

impl Server {
    pub async fn start() -> Self {
        let state = Shared::default();
        let app = Router::new()
            .route("/api/:endpoint", post(api))
            .route("/files/:name", get(file))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        Self {
            base_url: format!("http://{addr}").parse().unwrap(),
            state,
        }
    }

    pub fn client(&self) -> tvsurf::Client {
        tvsurf::Client::new(self.base_url.clone(), reqwest::Client::new()).with_token("secret")
    }

    pub fn respond(&self, endpoint: &str, body: Value) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(endpoint.to_owned(), (StatusCode::OK, body.to_string()));
    }

    pub fn fail(&self, endpoint: &str, status: StatusCode, message: &str) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(endpoint.to_owned(), (status, message.to_owned()));
    }

    pub fn serve_file(&self, name: &str, content: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(name.to_owned(), content.to_vec());
    }

    pub fn file_url(&self, name: &str) -> String {
        format!("{}files/{name}", self.base_url)
    }

    /// Endpoint and body of every API call so far.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.calls().into_iter().map(|(endpoint, _)| endpoint).collect()
    }
}

async fn api(
    State(state): State<Shared>,
    Path(endpoint): Path<String>,
    body: String,
) -> (StatusCode, String) {
    let body = serde_json::from_str(&body).unwrap_or(Value::Null);
    let mut state = state.lock().unwrap();
    state.calls.push((endpoint.clone(), body));
    state
        .responses
        .get(&endpoint)
        .cloned()
        .unwrap_or((StatusCode::OK, "{}".to_owned()))
}

async fn file(State(state): State<Shared>, Path(name): Path<String>) -> (StatusCode, Vec<u8>) {
    match state.lock().unwrap().files.get(&name) {
        Some(content) => (StatusCode::OK, content.clone()),
        None => (StatusCode::NOT_FOUND, Vec::new()),
    }
}

pub fn tv_info(id: i64, tag: &str, episode_id: i64) -> Value {
    json!({
        "id": id,
        "name": format!("Show {id}"),
        "cover_url": "",
        "series": [],
        "last_update": "2024-05-01T10:00:00",
        "total_episodes": 3,
        "user_data": {
            "tv_id": id,
            "tag": tag,
            "watch_progress": {"episode_id": episode_id, "time": 0.0},
            "last_update": "2024-05-01T10:00:00"
        }
    })
}

pub fn tv_details(id: i64, episodes: &[Option<&str>]) -> Value {
    let source_url = json!({
        "source_key": "p",
        "source_name": "Provider",
        "channel_name": "Line 1",
        "url": "https://provider/show"
    });
    let source_episodes: Vec<Value> = (0..episodes.len())
        .map(|i| json!({"source": source_url, "name": format!("Episode {}", i + 1)}))
        .collect();
    json!({
        "tv": {
            "id": id,
            "name": format!("Show {id}"),
            "source": {"source": source_url, "name": format!("Show {id}"), "cover_url": "", "episodes": source_episodes},
            "storage": {"directory": format!("show-{id}"), "episodes": [], "cover": ""},
            "track": {"tracking": true, "latest_update": "2024-05-01T10:00:00"},
            "series": []
        },
        "info": tv_info(id, "watching", 0),
        "episodes": episodes
    })
}

/// Answers for every call made when entering offline mode.
pub fn serve_snapshot(server: &Server) {
    server.respond(
        "whoami",
        json!({"user": {"username": "alice", "group": ["user"]}, "single_user_mode": false}),
    );
    server.respond(
        "get_tv_infos",
        json!({"tvs": [tv_info(1, "wanted", 0), tv_info(2, "watching", 1)]}),
    );
    server.respond(
        "get_series",
        json!({"series": [{"id": 10, "name": "Favourites", "tvs": [2], "last_update": "2024-05-01T10:00:00"}]}),
    );
    server.respond(
        "get_multiple_tv_details",
        json!({"tv_details": [tv_details(1, &[Some("/files/1_0.mp4")]), tv_details(2, &[None, None])]}),
    );
}
