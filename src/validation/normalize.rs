use crate::catalog::{Artist, ProcessedTrack};
use crate::validation::schema::as_integer;
use serde_json::Value;

const UNKNOWN_ARTIST: &str = "unknown_artist";

fn str_field<'a>(value: &'a Value, name: &str) -> Option<&'a str> {
    value.get(name).and_then(Value::as_str)
}

/// Flattens a checked track object into a processed row
///
/// The track must already have passed `TRACK_SCHEMA`.
pub fn normalize_track(
    track: &Value,
    artist: &Artist,
    genre: &str,
    collected_at: &str,
) -> ProcessedTrack {
    let popularity = track
        .get("popularity")
        .and_then(as_integer)
        .unwrap_or(0)
        .clamp(0, 100) as u32;

    let duration_ms = track
        .get("duration_ms")
        .and_then(as_integer)
        .and_then(|d| u64::try_from(d).ok());

    let album_name = track
        .get("album")
        .and_then(|album| str_field(album, "name"))
        .map(str::to_string);

    // Prefer the name we searched for; the credited name is the fallback
    let artist_name = if !artist.name.trim().is_empty() {
        artist.name.clone()
    } else {
        track
            .get("artists")
            .and_then(Value::as_array)
            .and_then(|artists| artists.iter().find_map(|a| str_field(a, "name")))
            .unwrap_or(UNKNOWN_ARTIST)
            .to_string()
    };

    ProcessedTrack {
        track_id: str_field(track, "id").unwrap_or_default().trim().to_string(),
        track_name: str_field(track, "name").unwrap_or_default().to_string(),
        artist_id: artist.id.clone(),
        artist_name,
        genre: genre.to_string(),
        popularity,
        duration_ms,
        explicit: track.get("explicit").and_then(Value::as_bool),
        preview_url: str_field(track, "preview_url").map(str::to_string),
        album_name,
        collected_at: collected_at.to_string(),
    }
}
