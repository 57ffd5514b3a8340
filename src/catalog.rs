//! Catalog entities shared by the collector, validator and loader
//!
//! Raw entities keep the JSON exactly as the API returned it so the raw
//! layer stays a faithful snapshot; processed entities are the flattened
//! rows that end up in the processed layer and the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An artist discovered for a genre
#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    /// External (Spotify) artist id
    pub id: String,

    /// Display name, empty when the API omitted it
    pub name: String,

    /// The artist object as received
    pub raw: Value,
}

impl Artist {
    /// Builds an artist from an API artist object
    ///
    /// Returns None when the object has no usable id, since such an artist
    /// cannot be queried for tracks.
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = value.get("id")?.as_str()?.trim();
        if id.is_empty() {
            return None;
        }

        let name = value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Some(Self {
            id: id.to_string(),
            name,
            raw: value.clone(),
        })
    }
}

/// A playlist returned by playlist search
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub track_total: Option<u64>,
}

impl PlaylistSummary {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = value.get("id")?.as_str()?.to_string();
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let track_total = value
            .get("tracks")
            .and_then(|t| t.get("total"))
            .and_then(Value::as_u64);

        Some(Self {
            id,
            name,
            track_total,
        })
    }
}

/// One artist and its top-tracks response, as collected
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub artist: Artist,
    pub top_tracks: Value,
}

/// Everything fetched for a genre in one collection run
#[derive(Debug, Clone)]
pub struct RawBatch {
    pub genre: String,
    pub market: String,
    pub collected_at: DateTime<Utc>,
    pub entries: Vec<RawEntry>,
}

impl RawBatch {
    pub fn new(genre: &str, market: &str) -> Self {
        Self {
            genre: genre.to_string(),
            market: market.to_string(),
            collected_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, artist: Artist, top_tracks: Value) {
        self.entries.push(RawEntry { artist, top_tracks });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of the artists in this batch, in collection order
    pub fn artist_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.artist.id.clone()).collect()
    }
}

/// A validated, flattened track row
///
/// This is the processed-layer record: one per track, carrying the artist
/// and genre it was collected under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedTrack {
    pub track_id: String,
    pub track_name: String,
    pub artist_id: String,
    pub artist_name: String,
    pub genre: String,
    pub popularity: u32,
    pub duration_ms: Option<u64>,
    pub explicit: Option<bool>,
    pub preview_url: Option<String>,
    pub album_name: Option<String>,
    pub collected_at: String,
}
