#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use url::Url;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub endpoint: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct MockState {
    responses: HashMap<String, (StatusCode, String)>,
    requests: Vec<Recorded>,
}

type Shared = Arc<Mutex<MockState>>;

/// In-process backend answering `POST /api/{endpoint}` with canned bodies.
pub struct MockBackend {
    pub base_url: Url,
    state: Shared,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Shared::default();
        let app = Router::new()
            .route("/api/:endpoint", post(handle))
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
        tvsurf::Client::new(self.base_url.clone(), reqwest::Client::new())
    }

    pub fn respond(&self, endpoint: &str, body: Value) {
        self.respond_text(endpoint, StatusCode::OK, &body.to_string());
    }

    pub fn respond_text(&self, endpoint: &str, status: StatusCode, body: &str) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(endpoint.to_owned(), (status, body.to_owned()));
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("no request recorded")
    }
}

async fn handle(
    State(state): State<Shared>,
    Path(endpoint): Path<String>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);
    let body = serde_json::from_str(&body).unwrap_or(Value::Null);
    let mut state = state.lock().unwrap();
    state.requests.push(Recorded {
        endpoint: endpoint.clone(),
        authorization,
        body,
    });
    state
        .responses
        .get(&endpoint)
        .cloned()
        .unwrap_or((StatusCode::OK, "{}".to_owned()))
}

pub fn tv_info(id: i64, cover_url: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Show {id}"),
        "cover_url": cover_url,
        "series": [],
        "last_update": "2024-05-01T10:00:00",
        "total_episodes": 12,
        "user_data": {
            "tv_id": id,
            "tag": "watching",
            "watch_progress": {"episode_id": 2, "time": 93.5},
            "last_update": "0001-01-01T00:00:00"
        }
    })
}

pub fn source_url(url: &str) -> Value {
    json!({
        "source_key": "ep1",
        "source_name": "Provider",
        "channel_name": "Line 1",
        "url": url
    })
}

pub fn tv_details(id: i64, episodes: &[Option<&str>]) -> Value {
    let source_episodes: Vec<Value> = episodes
        .iter()
        .enumerate()
        .map(|(i, _)| json!({"source": source_url(&format!("https://provider/{id}/{i}")), "name": format!("Episode {}", i + 1)}))
        .collect();
    let storage: Vec<Value> = episodes
        .iter()
        .enumerate()
        .map(|(i, url)| {
            json!({
                "name": format!("Episode {}", i + 1),
                "filename": format!("{i}.mp4"),
                "status": if url.is_some() { "success" } else { "running" }
            })
        })
        .collect();
    json!({
        "tv": {
            "id": id,
            "name": format!("Show {id}"),
            "source": {
                "source": source_url(&format!("https://provider/{id}")),
                "name": format!("Show {id}"),
                "cover_url": "",
                "episodes": source_episodes
            },
            "storage": {"directory": format!("show-{id}"), "episodes": storage, "cover": "cover.jpg"},
            "track": {"tracking": true, "latest_update": "2024-05-01T10:00:00"},
            "series": []
        },
        "info": tv_info(id, &format!("/resource/{id}/cover.jpg")),
        "episodes": episodes
    })
}
