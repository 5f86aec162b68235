mod common;

use axum::http::StatusCode;
use serde_json::json;
use tvsurf_cli::offline::{OfflineStore, PendingOperation};
use tvsurf_cli::playback::{Ended, PlaybackSession};

use common::{serve_snapshot, tv_details, Server};

fn progress_writes(server: &Server) -> Vec<serde_json::Value> {
    server
        .calls()
        .into_iter()
        .filter(|(endpoint, _)| endpoint == "set_watch_progress")
        .map(|(_, body)| body)
        .collect()
}

#[tokio::test]
async fn test_session_writes_progress_to_server() {
    let server = Server::start().await;
    server.respond(
        "get_tv_details",
        tv_details(4, &[Some("/files/4_0.mp4"), Some("/files/4_1.mp4")]),
    );
    let client = server.client();
    let details = tvsurf::tv::details(&client, 4).await.unwrap();

    let mut session = PlaybackSession::open(&details, client);
    assert_eq!(session.url(), Some(server.file_url("4_0.mp4").as_str()));

    assert!(!session.time_update(12.0).await);
    session.pause().await;
    session.seeked(40.0).await;
    let next = session.ended().await;
    assert_eq!(
        next,
        Ended::Next {
            episode: 1,
            url: Some(server.file_url("4_1.mp4"))
        }
    );
    assert_eq!(session.ended().await, Ended::Finished);

    assert_eq!(
        progress_writes(&server),
        [
            json!({"tv_id": 4, "episode_id": 0, "time": 12.0}),
            json!({"tv_id": 4, "episode_id": 0, "time": 40.0}),
            json!({"tv_id": 4, "episode_id": 1, "time": 0.0}),
            json!({"tv_id": 4, "episode_id": 2, "time": 0.0}),
        ]
    );
}

#[tokio::test]
async fn test_server_errors_do_not_stop_playback() {
    let server = Server::start().await;
    server.respond("get_tv_details", tv_details(4, &[Some("/a"), Some("/b")]));
    server.fail("set_watch_progress", StatusCode::SERVICE_UNAVAILABLE, "down");
    let client = server.client();
    let details = tvsurf::tv::details(&client, 4).await.unwrap();

    let mut session = PlaybackSession::open(&details, client);
    session.pause().await;
    assert!(session.select_episode(1).await);
    assert_eq!(session.episode(), 1);
    assert_eq!(progress_writes(&server).len(), 2);
}

#[tokio::test]
async fn test_offline_session_queues_progress() {
    let server = Server::start().await;
    serve_snapshot(&server);
    let dir = tempfile::tempdir().unwrap();
    let mut store = OfflineStore::open(dir.path());
    store.enter(&server.client()).await.unwrap();
    let details = store.tv_details(1).unwrap();

    let mut session = PlaybackSession::open(&details, &mut store);
    session.seeked(61.0).await;
    session.pause().await;
    assert_eq!(session.ended().await, Ended::Finished);
    drop(session);

    assert_eq!(
        store.pending(),
        [PendingOperation::WatchProgress {
            tv_id: 1,
            episode_id: 1,
            time: 0.0
        }]
    );
    let tv = &store.tv_infos(Some(&[1]))[0];
    assert_eq!(tv.user_data.watch_progress.episode_id, 1);
}
