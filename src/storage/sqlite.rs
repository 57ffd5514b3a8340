//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the TrackStore trait.

use crate::catalog::ProcessedTrack;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, TrackStore};
use crate::storage::{LoadResult, RunRecord, RunStatus, RunSummary};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const TRACK_COLUMNS: &str = "track_id, track_name, artist_id, artist_name, genre, popularity,
     duration_ms, explicit, preview_url, album_name, collected_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`, creating parent directories
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<ProcessedTrack> {
    Ok(ProcessedTrack {
        track_id: row.get(0)?,
        track_name: row.get(1)?,
        artist_id: row.get(2)?,
        artist_name: row.get(3)?,
        genre: row.get(4)?,
        popularity: row.get::<_, i64>(5)?.clamp(0, i64::from(u32::MAX)) as u32,
        duration_ms: row.get::<_, Option<i64>>(6)?.map(|d| d.max(0) as u64),
        explicit: row.get::<_, Option<bool>>(7)?,
        preview_url: row.get(8)?,
        album_name: row.get(9)?,
        collected_at: row.get(10)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        mode: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Running),
        genres_processed: row.get::<_, i64>(6)?.max(0) as u64,
        tracks_loaded: row.get::<_, i64>(7)?.max(0) as u64,
        errors: row.get::<_, i64>(8)?.max(0) as u64,
    })
}

impl TrackStore for SqliteStorage {
    // ===== Tracks =====

    fn upsert_tracks(&mut self, tracks: &[ProcessedTrack]) -> StorageResult<LoadResult> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut result = LoadResult::default();

        {
            let mut exists = tx.prepare("SELECT 1 FROM tracks WHERE track_id = ?1")?;
            let mut upsert = tx.prepare(
                "INSERT INTO tracks (track_id, track_name, artist_id, artist_name, genre, popularity,
                     duration_ms, explicit, preview_url, album_name, collected_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(track_id) DO UPDATE SET
                     track_name = excluded.track_name,
                     artist_id = excluded.artist_id,
                     artist_name = excluded.artist_name,
                     genre = excluded.genre,
                     popularity = excluded.popularity,
                     duration_ms = excluded.duration_ms,
                     explicit = excluded.explicit,
                     preview_url = excluded.preview_url,
                     album_name = excluded.album_name,
                     collected_at = excluded.collected_at,
                     updated_at = excluded.updated_at",
            )?;

            for track in tracks {
                let existed = exists
                    .query_row(params![track.track_id], |_| Ok(()))
                    .optional()?
                    .is_some();

                upsert.execute(params![
                    track.track_id,
                    track.track_name,
                    track.artist_id,
                    track.artist_name,
                    track.genre,
                    i64::from(track.popularity),
                    track.duration_ms.map(|d| d.min(i64::MAX as u64) as i64),
                    track.explicit,
                    track.preview_url,
                    track.album_name,
                    track.collected_at,
                    now,
                ])?;

                if existed {
                    result.updated += 1;
                } else {
                    result.inserted += 1;
                }
            }
        }

        tx.commit()?;
        Ok(result)
    }

    fn get_track(&self, track_id: &str) -> StorageResult<Option<ProcessedTrack>> {
        let track = self
            .conn
            .query_row(
                &format!("SELECT {} FROM tracks WHERE track_id = ?1", TRACK_COLUMNS),
                params![track_id],
                track_from_row,
            )
            .optional()?;
        Ok(track)
    }

    fn top_tracks(&self, genre: &str, limit: usize) -> StorageResult<Vec<ProcessedTrack>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM tracks WHERE genre = ?1
             ORDER BY popularity DESC, track_id ASC LIMIT ?2",
            TRACK_COLUMNS
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![genre, limit], track_from_row)?;

        let mut tracks = Vec::new();
        for row in rows {
            tracks.push(row?);
        }
        Ok(tracks)
    }

    // ===== Statistics =====

    fn count_tracks(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_artists(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT artist_id) FROM tracks",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_tracks_by_genre(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT genre, COUNT(*) FROM tracks GROUP BY genre ORDER BY genre")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    // ===== Run Management =====

    fn create_run(&mut self, mode: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (mode, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![mode, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &RunSummary,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, genres_processed = ?3,
                 tracks_loaded = ?4, errors = ?5
             WHERE id = ?6",
            params![
                status.to_db_string(),
                now,
                summary.genres_processed as i64,
                summary.tracks_loaded as i64,
                summary.errors as i64,
                run_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, mode, started_at, finished_at, config_hash, status,
                     genres_processed, tracks_loaded, errors
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }
}
