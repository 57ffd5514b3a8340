//! JSON-file checkpoint store

use crate::state::{GenreCheckpoint, RotationState};
use crate::storage::files::{file_timestamp, genre_slug, write_json_atomic};
use crate::storage::traits::{CheckpointStore, StorageResult};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CHECKPOINT_PREFIX: &str = "checkpoint_";

/// Stores one `checkpoint_<genre>.json` per genre plus the rotation file
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    dir: PathBuf,
    rotation_path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, rotation_path: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            rotation_path: rotation_path.into(),
        }
    }

    pub fn checkpoint_path(&self, genre: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}.json", CHECKPOINT_PREFIX, genre_slug(genre)))
    }

    pub fn rotation_path(&self) -> &Path {
        &self.rotation_path
    }

    /// First unused `<checkpoint>.<timestamp>[_n].bak` path
    fn backup_path(checkpoint: &Path) -> PathBuf {
        let mut stem = checkpoint.as_os_str().to_owned();
        stem.push(".");
        stem.push(file_timestamp(Utc::now()));

        let mut suffix = 0;
        loop {
            let mut name = stem.clone();
            if suffix > 0 {
                name.push(format!("_{}", suffix));
            }
            name.push(".bak");

            let backup = PathBuf::from(name);
            if !backup.exists() {
                return backup;
            }
            suffix += 1;
        }
    }
}

/// Reads a JSON file; missing and unparseable files both read as None
fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str(&content) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring corrupt state file");
            Ok(None)
        }
    }
}

fn with_genre(mut checkpoint: GenreCheckpoint, genre: &str) -> GenreCheckpoint {
    if checkpoint.genre.is_empty() {
        checkpoint.genre = genre.to_string();
    }
    checkpoint.artist_count = checkpoint.artist_count.max(checkpoint.processed_artists.len());
    checkpoint
}

impl CheckpointStore for JsonCheckpointStore {
    fn load_checkpoint(&self, genre: &str) -> StorageResult<Option<GenreCheckpoint>> {
        let path = self.checkpoint_path(genre);
        Ok(read_json::<GenreCheckpoint>(&path)?.map(|cp| with_genre(cp, genre)))
    }

    fn save_checkpoint(&self, checkpoint: &GenreCheckpoint) -> StorageResult<()> {
        let path = self.checkpoint_path(&checkpoint.genre);
        write_json_atomic(&path, checkpoint)?;
        debug!(genre = %checkpoint.genre, status = %checkpoint.status, "Checkpoint saved");
        Ok(())
    }

    fn reset_checkpoint(&self, genre: &str) -> StorageResult<bool> {
        let path = self.checkpoint_path(genre);
        if !path.exists() {
            return Ok(false);
        }

        let backup = Self::backup_path(&path);
        match fs::rename(&path, &backup) {
            Ok(()) => {
                debug!(genre, backup = %backup.display(), "Checkpoint moved aside");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_checkpoints(&self) -> StorageResult<Vec<GenreCheckpoint>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut checkpoints = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(slug) = name
                .strip_prefix(CHECKPOINT_PREFIX)
                .and_then(|rest| rest.strip_suffix(".json"))
            else {
                continue;
            };

            if let Some(cp) = read_json::<GenreCheckpoint>(&path)? {
                checkpoints.push(with_genre(cp, slug));
            }
        }

        checkpoints.sort_by(|a, b| a.genre.cmp(&b.genre));
        Ok(checkpoints)
    }

    fn load_rotation(&self) -> StorageResult<Option<RotationState>> {
        Ok(read_json::<RotationState>(&self.rotation_path)?.map(RotationState::normalized))
    }

    fn save_rotation(&self, state: &RotationState) -> StorageResult<()> {
        write_json_atomic(&self.rotation_path, state)?;
        debug!(index = state.index, last_genre = ?state.last_genre, "Rotation saved");
        Ok(())
    }
}
