//! Single-genre collection end-to-end: files, database rows, checkpoints

use crate::common::{
    artist, checkpoint_store, coordinator, count_json_files, mount_artist_search,
    mount_playlist_search, mount_token, mount_top_tracks, track,
};
use genre_harvest::collector::CollectRequest;
use genre_harvest::storage::CheckpointStore;
use genre_harvest::{GenreCheckpoint, GenreStatus, HarvestError};
use serde_json::json;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_collect_genre_end_to_end() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server).await;
    mount_artist_search(&server, vec![artist("a1"), artist("a2")]).await;
    mount_top_tracks(&server, "a1", vec![track("t1", "a1", 70), track("t2", "a1", 40)]).await;
    mount_top_tracks(
        &server,
        "a2",
        vec![
            track("t3", "a2", 90),
            // Out-of-range popularity is dropped by validation
            track("t4", "a2", 150),
        ],
    )
    .await;

    let (mut coordinator, metrics) = coordinator(&server, dir.path(), &[]);
    let result = coordinator
        .collect(&CollectRequest::new("rock", 10, "BR"))
        .await
        .unwrap();

    assert_eq!(result.status, GenreStatus::Done);
    assert_eq!(result.artists_collected, 2);
    assert_eq!(result.tracks_collected, 3);
    assert_eq!(result.violations, 1);
    assert_eq!(result.inserted, 3);
    assert_eq!(result.strategy.as_deref(), Some("genre_search"));

    // One artist file and one top-tracks file per artist
    assert_eq!(count_json_files(&dir.path().join("raw").join("rock")), 4);
    assert_eq!(count_json_files(&dir.path().join("processed").join("rock")), 1);

    let storage = coordinator.storage();
    assert_eq!(storage.count_tracks().unwrap(), 3);
    assert_eq!(storage.count_artists().unwrap(), 2);
    let stored = storage.get_track("t3").unwrap().unwrap();
    assert_eq!(stored.popularity, 90);
    assert_eq!(stored.genre, "rock");
    assert_eq!(stored.album_name.as_deref(), Some("Album"));
    assert!(storage.get_track("t4").unwrap().is_none());

    let checkpoint = checkpoint_store(dir.path())
        .load_checkpoint("rock")
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.status, GenreStatus::Done);
    assert_eq!(checkpoint.processed_artists, vec!["a1", "a2"]);
    assert_eq!(checkpoint.track_count, 3);
    assert!(checkpoint.last_run_timestamp.is_some());

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.counter("artists_fetched"), 2);
    assert_eq!(snapshot.counter("schema_violations"), 1);
    assert_eq!(snapshot.counter("tracks_inserted"), 3);
    assert_eq!(snapshot.counter("genres_done"), 1);
}

#[tokio::test]
async fn test_done_genre_makes_no_api_calls() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut done = GenreCheckpoint::new("rock");
    done.finish(GenreStatus::Done, 5, 0);
    checkpoint_store(dir.path()).save_checkpoint(&done).unwrap();

    let (mut coordinator, metrics) = coordinator(&server, dir.path(), &[]);
    let result = coordinator
        .collect(&CollectRequest::new("rock", 10, "BR"))
        .await
        .unwrap();

    assert!(result.skipped);
    assert_eq!(result.status, GenreStatus::Done);
    assert_eq!(metrics.snapshot().counter("api_calls"), 0);
    assert_eq!(metrics.snapshot().counter("genres_skipped"), 1);
}

#[tokio::test]
async fn test_force_collects_done_genre_again() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server).await;
    mount_artist_search(&server, vec![artist("a1")]).await;
    mount_top_tracks(&server, "a1", vec![track("t1", "a1", 70)]).await;

    let mut done = GenreCheckpoint::new("rock");
    done.finish(GenreStatus::Done, 5, 0);
    let store = checkpoint_store(dir.path());
    store.save_checkpoint(&done).unwrap();

    let (mut coordinator, _metrics) = coordinator(&server, dir.path(), &[]);
    let result = coordinator
        .collect(&CollectRequest::new("rock", 10, "BR").forced(true))
        .await
        .unwrap();

    assert!(!result.skipped);
    assert_eq!(result.tracks_collected, 1);
    let backups: Vec<_> = std::fs::read_dir(dir.path().join("checkpoints"))
        .unwrap()
        .flatten()
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.starts_with("checkpoint_rock.json.") && name.ends_with(".bak"))
        .collect();
    assert_eq!(backups.len(), 1);
    assert_eq!(
        store.load_checkpoint("rock").unwrap().unwrap().track_count,
        1
    );
}

#[tokio::test]
async fn test_failed_genre_resumes_without_processed_artists() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server).await;
    mount_artist_search(&server, vec![artist("a1"), artist("a2"), artist("a3")]).await;
    Mock::given(method("GET"))
        .and(path("/v1/artists/a1/top-tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tracks": []})))
        .expect(0)
        .mount(&server)
        .await;
    mount_top_tracks(&server, "a2", vec![track("t2", "a2", 50)]).await;
    mount_top_tracks(&server, "a3", vec![track("t3", "a3", 50)]).await;

    let mut failed = GenreCheckpoint::new("rock");
    failed.record_artists(vec!["a1".to_string()]);
    failed.finish(GenreStatus::Failed, 1, 1);
    let store = checkpoint_store(dir.path());
    store.save_checkpoint(&failed).unwrap();

    let (mut coordinator, _metrics) = coordinator(&server, dir.path(), &[]);
    let result = coordinator
        .collect(&CollectRequest::new("rock", 2, "BR"))
        .await
        .unwrap();

    assert_eq!(result.status, GenreStatus::Done);
    assert_eq!(result.artists_collected, 2);

    let checkpoint = store.load_checkpoint("rock").unwrap().unwrap();
    assert_eq!(checkpoint.processed_artists, vec!["a1", "a2", "a3"]);
    assert_eq!(checkpoint.artist_count, 3);
}

#[tokio::test]
async fn test_fatal_error_keeps_loaded_artists() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server).await;
    mount_artist_search(&server, vec![artist("a1"), artist("a2"), artist("a3")]).await;
    mount_top_tracks(&server, "a1", vec![track("t1", "a1", 50)]).await;
    Mock::given(method("GET"))
        .and(path("/v1/artists/a2/top-tracks"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/artists/a3/top-tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tracks": []})))
        .expect(0)
        .mount(&server)
        .await;

    let (mut coordinator, _metrics) = coordinator(&server, dir.path(), &[]);
    let result = coordinator
        .collect(&CollectRequest::new("rock", 10, "BR"))
        .await;

    assert!(matches!(result, Err(HarvestError::Api(_))));
    assert_eq!(coordinator.storage().count_tracks().unwrap(), 1);

    let checkpoint = checkpoint_store(dir.path())
        .load_checkpoint("rock")
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.status, GenreStatus::Failed);
    assert_eq!(checkpoint.processed_artists, vec!["a1"]);
}

#[tokio::test]
async fn test_artist_without_valid_tracks_is_not_recorded() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server).await;
    let mut broken = artist("a1");
    broken["popularity"] = json!("very");
    mount_artist_search(&server, vec![broken]).await;
    mount_top_tracks(&server, "a1", vec![track("t1", "a1", 50)]).await;

    let (mut coordinator, _metrics) = coordinator(&server, dir.path(), &[]);
    let result = coordinator
        .collect(&CollectRequest::new("rock", 10, "BR"))
        .await
        .unwrap();

    assert_eq!(result.status, GenreStatus::Failed);
    assert_eq!(result.tracks_collected, 0);
    assert_eq!(result.violations, 1);
    assert_eq!(coordinator.storage().count_tracks().unwrap(), 0);

    let checkpoint = checkpoint_store(dir.path())
        .load_checkpoint("rock")
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.status, GenreStatus::Failed);
    assert!(checkpoint.processed_artists.is_empty());
    assert_eq!(checkpoint.artist_count, 0);
}

#[tokio::test]
async fn test_partially_invalid_batch_records_only_loaded_artists() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server).await;
    let mut broken = artist("a2");
    broken["popularity"] = json!("very");
    mount_artist_search(&server, vec![artist("a1"), broken]).await;
    mount_top_tracks(&server, "a1", vec![track("t1", "a1", 50)]).await;
    mount_top_tracks(&server, "a2", vec![track("t2", "a2", 50)]).await;

    let (mut coordinator, _metrics) = coordinator(&server, dir.path(), &[]);
    let result = coordinator
        .collect(&CollectRequest::new("rock", 10, "BR"))
        .await
        .unwrap();

    assert_eq!(result.status, GenreStatus::Done);
    let checkpoint = checkpoint_store(dir.path())
        .load_checkpoint("rock")
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.processed_artists, vec!["a1"]);
}

#[tokio::test]
async fn test_unbounded_quantity_does_not_overflow() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server).await;
    mount_artist_search(&server, vec![artist("a1"), artist("a2")]).await;
    mount_top_tracks(&server, "a1", vec![track("t1", "a1", 50)]).await;
    mount_top_tracks(&server, "a2", vec![track("t2", "a2", 50)]).await;

    // A failed checkpoint adds its processed artists to the wanted count
    let mut failed = GenreCheckpoint::new("rock");
    failed.record_artists(vec!["a0".to_string()]);
    failed.finish(GenreStatus::Failed, 1, 1);
    checkpoint_store(dir.path()).save_checkpoint(&failed).unwrap();

    let (mut coordinator, _metrics) = coordinator(&server, dir.path(), &[]);
    let result = coordinator
        .collect(&CollectRequest::new("rock", usize::MAX, "BR"))
        .await
        .unwrap();

    assert_eq!(result.status, GenreStatus::Done);
    assert_eq!(result.tracks_collected, 2);
}

#[tokio::test]
async fn test_transient_artist_failure_is_skipped() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server).await;
    mount_artist_search(&server, vec![artist("a1"), artist("a2")]).await;
    Mock::given(method("GET"))
        .and(path("/v1/artists/a1/top-tracks"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    mount_top_tracks(&server, "a2", vec![track("t2", "a2", 50)]).await;

    let (mut coordinator, metrics) = coordinator(&server, dir.path(), &[]);
    let result = coordinator
        .collect(&CollectRequest::new("rock", 10, "BR"))
        .await
        .unwrap();

    assert_eq!(result.status, GenreStatus::Done);
    assert_eq!(result.errors, 1);
    assert_eq!(result.artists_collected, 1);
    assert_eq!(metrics.snapshot().counter("artist_errors"), 1);

    // Only the loaded artist is recorded; the genre is done, so the failed
    // one is fetched again only by a forced run
    let checkpoint = checkpoint_store(dir.path())
        .load_checkpoint("rock")
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.processed_artists, vec!["a2"]);
    assert_eq!(checkpoint.error_count, 1);
}

#[tokio::test]
async fn test_genre_without_artists_is_marked_empty() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server).await;
    mount_artist_search(&server, vec![]).await;
    mount_playlist_search(&server, vec![]).await;

    let (mut coordinator, _metrics) = coordinator(&server, dir.path(), &[]);
    let result = coordinator
        .collect(&CollectRequest::new("polka", 10, "BR"))
        .await
        .unwrap();

    assert_eq!(result.status, GenreStatus::Empty);
    assert_eq!(coordinator.storage().count_tracks().unwrap(), 0);
    assert_eq!(count_json_files(&dir.path().join("processed")), 0);

    let again = coordinator
        .collect(&CollectRequest::new("polka", 10, "BR"))
        .await
        .unwrap();
    assert!(again.skipped);
}

#[tokio::test]
async fn test_collect_all_writes_rankings() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_token(&server).await;
    mount_artist_search(&server, vec![artist("a1")]).await;
    mount_top_tracks(
        &server,
        "a1",
        vec![track("t1", "a1", 20), track("t2", "a1", 80)],
    )
    .await;

    let (mut coordinator, _metrics) = coordinator(&server, dir.path(), &["samba"]);
    let outcome = coordinator
        .run_collect_all(&CollectRequest::new("", 5, "BR"))
        .await
        .unwrap();

    assert!(!outcome.has_failures());
    assert_eq!(outcome.tracks_collected(), 2);

    let rankings: Vec<_> = std::fs::read_dir(dir.path().join("processed"))
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with("top_tracks_samba_"))
        })
        .collect();
    assert_eq!(rankings.len(), 1);

    let ranking: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&rankings[0]).unwrap()).unwrap();
    assert_eq!(ranking[0]["track_id"], "t2");
    assert_eq!(ranking[0]["rank"], 1);
}
