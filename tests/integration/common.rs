//! Shared fixtures for the integration tests

use genre_harvest::collector::{Coordinator, Credentials, RetryPolicy, SpotifyClient};
use genre_harvest::config::{ApiConfig, Config};
use genre_harvest::output::Metrics;
use genre_harvest::storage::JsonCheckpointStore;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// API endpoints pointing at the mock server
pub fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        accounts_url: server.uri(),
        base_url: format!("{}/v1", server.uri()),
        ..ApiConfig::default()
    }
}

/// A client that retries immediately, plus the metrics it reports to
pub fn client(server: &MockServer, attempts: u32) -> (SpotifyClient, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new().unwrap());
    let client = SpotifyClient::new(
        &api_config(server),
        RetryPolicy::immediate(attempts),
        Some(Credentials::new("test-id", "test-secret")),
        metrics.clone(),
    )
    .expect("Failed to build client");
    (client, metrics)
}

/// A coordinator storing everything under `data_dir`
pub fn coordinator(
    server: &MockServer,
    data_dir: &Path,
    genres: &[&str],
) -> (Coordinator<SpotifyClient>, Arc<Metrics>) {
    let mut config = Config::default();
    config.api = api_config(server);
    config.output.data_dir = data_dir.to_path_buf();
    config.collection.genres = genres.iter().map(|g| g.to_string()).collect();

    let (client, metrics) = client(server, 2);
    let coordinator =
        Coordinator::from_config(&config, client, metrics.clone()).expect("Failed to open storage");
    (coordinator, metrics)
}

/// The checkpoint store a coordinator over `data_dir` uses
pub fn checkpoint_store(data_dir: &Path) -> JsonCheckpointStore {
    let dir = data_dir.join("checkpoints");
    JsonCheckpointStore::new(&dir, dir.join("genre_rotation.json"))
}

pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

pub fn artist(id: &str) -> Value {
    json!({"id": id, "name": format!("Artist {}", id), "popularity": 50, "genres": ["rock"]})
}

pub fn track(id: &str, artist_id: &str, popularity: u64) -> Value {
    json!({
        "id": id,
        "name": format!("Track {}", id),
        "popularity": popularity,
        "duration_ms": 180000,
        "explicit": false,
        "preview_url": null,
        "album": {"name": "Album"},
        "artists": [{"id": artist_id, "name": format!("Artist {}", artist_id)}]
    })
}

/// Mounts a genre search answering with `artists` on one page
pub async fn mount_artist_search(server: &MockServer, artists: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("type", "artist"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"artists": {"items": artists}})),
        )
        .mount(server)
        .await;
}

/// Mounts a playlist search answering with `playlists`
pub async fn mount_playlist_search(server: &MockServer, playlists: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("type", "playlist"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"playlists": {"items": playlists}})),
        )
        .mount(server)
        .await;
}

/// Mounts the top-tracks response of one artist
pub async fn mount_top_tracks(server: &MockServer, artist_id: &str, tracks: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/artists/{}/top-tracks", artist_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tracks": tracks})))
        .mount(server)
        .await;
}

/// Counts `.json` files below `dir`
pub fn count_json_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_json_files(&path)
            } else if path.extension().map_or(false, |ext| ext == "json") {
                1
            } else {
                0
            }
        })
        .sum()
}
