//! Client behavior against a mock Web API: retries, error classes, paging

use crate::common::{api_config, artist, client, mount_token, track};
use genre_harvest::collector::{
    CatalogApi, Credentials, DiscoveryChain, RetryPolicy, SpotifyClient,
};
use genre_harvest::output::Metrics;
use genre_harvest::ApiError;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{any, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/artists/a1/top-tracks"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/artists/a1/top-tracks"))
        .and(query_param("market", "BR"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"tracks": [track("t1", "a1", 40)]})),
        )
        .mount(&server)
        .await;

    let (client, metrics) = client(&server, 3);
    let body = client.artist_top_tracks("a1", "BR").await.unwrap();

    assert_eq!(body["tracks"][0]["id"], "t1");
    let snapshot = metrics.snapshot();
    // One token request plus two attempts
    assert_eq!(snapshot.counter("api_calls"), 3);
    assert_eq!(snapshot.counter("api_retries"), 1);
    assert_eq!(snapshot.counter("api_errors"), 0);
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/artists/a1/top-tracks"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/artists/a1/top-tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tracks": []})))
        .mount(&server)
        .await;

    let (client, metrics) = client(&server, 3);
    client.artist_top_tracks("a1", "BR").await.unwrap();

    assert_eq!(metrics.snapshot().counter("api_rate_limited"), 1);
}

#[tokio::test]
async fn test_oversized_retry_after_is_capped() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    // Out of range for a Duration, then valid but decades long
    for wait in ["1e20", "1000000000"] {
        Mock::given(method("GET"))
            .and(path("/v1/artists/a1/top-tracks"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", wait))
            .up_to_n_times(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/v1/artists/a1/top-tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tracks": []})))
        .mount(&server)
        .await;

    let metrics = Arc::new(Metrics::new().unwrap());
    let client = SpotifyClient::new(
        &api_config(&server),
        RetryPolicy::immediate(3).with_max_retry_after(Duration::from_millis(20)),
        Some(Credentials::new("test-id", "test-secret")),
        metrics.clone(),
    )
    .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        client.artist_top_tracks("a1", "BR"),
    )
    .await
    .expect("retry wait was not capped");

    assert_eq!(result.unwrap()["tracks"], json!([]));
    assert_eq!(metrics.snapshot().counter("api_rate_limited"), 2);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/artists/a1/top-tracks"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid market"))
        .expect(1)
        .mount(&server)
        .await;

    let (client, metrics) = client(&server, 5);
    let result = client.artist_top_tracks("a1", "XX").await;

    match result {
        Err(ApiError::Fatal { status, message, .. }) => {
            assert_eq!(status, Some(400));
            assert!(message.contains("invalid market"));
        }
        other => panic!("Expected a fatal error, got {:?}", other),
    }
    assert_eq!(metrics.snapshot().counter("api_errors"), 1);
}

#[tokio::test]
async fn test_retries_stop_at_max_attempts() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/artists/a1/top-tracks"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let (client, _metrics) = client(&server, 3);
    let result = client.artist_top_tracks("a1", "BR").await;

    assert!(matches!(result, Err(ApiError::Transient { .. })));
}

#[tokio::test]
async fn test_token_is_cached() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/artists/a1/top-tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tracks": []})))
        .expect(2)
        .mount(&server)
        .await;

    let (client, _metrics) = client(&server, 1);
    client.artist_top_tracks("a1", "BR").await.unwrap();
    client.artist_top_tracks("a1", "BR").await.unwrap();
}

#[tokio::test]
async fn test_missing_credentials_make_no_requests() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = SpotifyClient::new(
        &api_config(&server),
        RetryPolicy::immediate(3),
        None,
        Arc::new(Metrics::new().unwrap()),
    )
    .unwrap();

    let result = client.search_artists("rock", 10).await;
    assert!(matches!(result, Err(ApiError::MissingCredentials)));
    assert!(client.available_genres().await.is_empty());
}

#[tokio::test]
async fn test_rejected_credentials_are_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .expect(1)
        .mount(&server)
        .await;

    let client = SpotifyClient::new(
        &api_config(&server),
        RetryPolicy::immediate(3),
        Some(Credentials::new("bad", "bad")),
        Arc::new(Metrics::new().unwrap()),
    )
    .unwrap();

    let result = client.artist_top_tracks("a1", "BR").await;
    assert!(matches!(
        result,
        Err(ApiError::Fatal {
            status: Some(401),
            ..
        })
    ));
}

#[tokio::test]
async fn test_artist_search_pages_through_offsets() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    let first: Vec<Value> = (0..50).map(|i| artist(&format!("a{}", i))).collect();
    // The second page repeats one artist from the first
    let mut second: Vec<Value> = (50..59).map(|i| artist(&format!("a{}", i))).collect();
    second.push(artist("a0"));

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("q", "genre:\"rock\""))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "50"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"artists": {"items": first}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("offset", "50"))
        .and(query_param("limit", "10"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"artists": {"items": second}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("offset", "60"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"artists": {"items": []}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, _metrics) = client(&server, 1);
    let artists = client.search_artists("rock", 60).await.unwrap();

    assert_eq!(artists.len(), 59);
    assert_eq!(artists[0].id, "a0");
    assert_eq!(artists[58].id, "a58");
}

#[tokio::test]
async fn test_playlist_tracks_follow_next_link() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    let next = format!("{}/v1/playlists/p1/tracks?offset=100&limit=100", server.uri());

    Mock::given(method("GET"))
        .and(path("/v1/playlists/p1/tracks"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"track": track("t3", "a2", 10)}],
            "next": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/playlists/p1/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"track": track("t1", "a1", 10)},
                {"track": null},
                {"track": {"id": "local", "is_local": true, "artists": []}},
                {"track": track("t2", "a1", 10)}
            ],
            "next": next
        })))
        .mount(&server)
        .await;

    let (client, _metrics) = client(&server, 1);
    let tracks = client.playlist_tracks("p1").await.unwrap();

    let ids: Vec<_> = tracks.iter().map(|t| t["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["t1", "t2", "t3"]);
}

#[tokio::test]
async fn test_genre_seeds_listing() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/recommendations/available-genre-seeds"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"genres": ["acoustic", "samba"]})),
        )
        .mount(&server)
        .await;

    let (client, _metrics) = client(&server, 1);
    assert_eq!(client.available_genres().await, vec!["acoustic", "samba"]);
}

#[tokio::test]
async fn test_playlist_fallback_over_http() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("type", "artist"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"artists": {"items": []}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("type", "playlist"))
        .and(query_param("q", "forro"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "playlists": {"items": [
                null,
                {"id": "p1", "name": "Forró Hits", "tracks": {"total": 50}},
                {"id": "p2", "name": "Other", "tracks": {"total": 10}}
            ]}
        })))
        .mount(&server)
        .await;

    // 50 tracks credited to 12 distinct artists
    let items: Vec<Value> = (0..50)
        .map(|i| json!({"track": track(&format!("t{}", i), &format!("a{}", i % 12), 30)}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/v1/playlists/p1/tracks"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"items": items, "next": null})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, _metrics) = client(&server, 1);
    let found = DiscoveryChain::default()
        .discover_artists(&client, "forro", 50)
        .await
        .unwrap();

    assert_eq!(found.strategy, Some("playlist_search"));
    assert_eq!(found.artists.len(), 12);
    assert_eq!(found.artists[0].id, "a0");
    assert_eq!(found.artists[11].id, "a11");
}
