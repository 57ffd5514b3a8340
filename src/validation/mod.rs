//! Validation and normalization of raw batches
//!
//! Every record is checked on its own: a bad record is dropped and reported,
//! the rest of the batch carries on. Nothing reaches the processed layer
//! without passing its schema.

mod normalize;
pub mod schema;

pub use normalize::normalize_track;
pub use schema::{check, FieldError, FieldKind, FieldRule, ARTIST_SCHEMA, TRACK_SCHEMA};

use crate::catalog::{ProcessedTrack, RawBatch};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

/// A record that was dropped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{record}: field `{field}` {reason}")]
pub struct SchemaViolation {
    /// Which record, e.g. `track t1 (artist a1)`
    pub record: String,
    pub field: String,
    pub reason: String,
}

/// Accepted rows and the reasons for everything else
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub records: Vec<ProcessedTrack>,
    pub violations: Vec<SchemaViolation>,
    /// Tracks dropped because an earlier record had the same id
    pub duplicates: usize,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Top-tracks responses come either as `{"tracks": [...]}` or a bare array
fn track_list(response: &Value) -> Option<&Vec<Value>> {
    response
        .as_array()
        .or_else(|| response.get("tracks").and_then(Value::as_array))
}

fn violation(report: &mut ValidationReport, genre: &str, record: String, error: FieldError) {
    warn!(
        genre = %genre,
        record = %record,
        field = error.field,
        reason = %error.reason,
        "Dropping invalid record"
    );
    report.violations.push(SchemaViolation {
        record,
        field: error.field.to_string(),
        reason: error.reason,
    });
}

/// Checks and flattens a raw batch into processed rows
///
/// An invalid artist drops that artist's tracks with a single violation.
/// Track ids are deduplicated across the batch; the first occurrence wins.
pub fn validate_and_normalize(batch: &RawBatch) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut seen = HashSet::new();
    let collected_at = batch.collected_at.to_rfc3339();

    for entry in &batch.entries {
        let artist = &entry.artist;

        if let Err(error) = check(&artist.raw, ARTIST_SCHEMA) {
            violation(&mut report, &batch.genre, format!("artist {}", artist.id), error);
            continue;
        }

        let Some(tracks) = track_list(&entry.top_tracks) else {
            violation(
                &mut report,
                &batch.genre,
                format!("top tracks of artist {}", artist.id),
                FieldError {
                    field: "tracks",
                    reason: "expected an array of tracks".to_string(),
                },
            );
            continue;
        };

        for (position, track) in tracks.iter().enumerate() {
            if let Err(error) = check(track, TRACK_SCHEMA) {
                let label = track
                    .get("id")
                    .and_then(Value::as_str)
                    .map(|id| format!("track {} (artist {})", id, artist.id))
                    .unwrap_or_else(|| format!("track #{} (artist {})", position, artist.id));
                violation(&mut report, &batch.genre, label, error);
                continue;
            }

            let row = normalize_track(track, artist, &batch.genre, &collected_at);
            if seen.insert(row.track_id.clone()) {
                report.records.push(row);
            } else {
                report.duplicates += 1;
            }
        }
    }

    debug!(
        genre = %batch.genre,
        records = report.records.len(),
        violations = report.violations.len(),
        duplicates = report.duplicates,
        "Validated batch"
    );

    report
}
