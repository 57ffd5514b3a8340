//! Round-robin genre rotation
//!
//! `RotationState` is a plain value: every operation returns a new state and
//! leaves persistence to the checkpoint store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered genre list plus the cursor of the next genre to process
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RotationState {
    #[serde(default)]
    pub genres: Vec<String>,

    /// Position of the next genre; always `< genres.len()` once normalized
    #[serde(default)]
    pub index: usize,

    #[serde(default)]
    pub last_genre: Option<String>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RotationState {
    pub fn new(genres: Vec<String>) -> Self {
        Self {
            genres,
            index: 0,
            last_genre: None,
            updated_at: None,
        }
    }

    pub fn len(&self) -> usize {
        self.genres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
    }

    /// The genre under the cursor, or None for an empty rotation
    pub fn next_genre(&self) -> Option<&str> {
        if self.genres.is_empty() {
            return None;
        }
        self.genres
            .get(self.index % self.genres.len())
            .map(String::as_str)
    }

    /// The next `count` genres starting at the cursor, wrapping at the end
    ///
    /// A count larger than the list yields repeats, exactly as a cursor
    /// walking the ring would.
    pub fn upcoming(&self, count: usize) -> Vec<String> {
        if self.genres.is_empty() {
            return Vec::new();
        }
        let len = self.genres.len();
        let start = self.index % len;
        (0..count)
            .map(|offset| self.genres[(start + offset % len) % len].clone())
            .collect()
    }

    /// Moves the cursor to the slot after `genre`
    ///
    /// A genre that is not part of the rotation leaves the state unchanged.
    pub fn advance(&self, genre: &str) -> RotationState {
        let Some(position) = self.genres.iter().position(|g| g == genre) else {
            return self.clone();
        };

        RotationState {
            genres: self.genres.clone(),
            index: (position + 1) % self.genres.len(),
            last_genre: Some(genre.to_string()),
            updated_at: Some(Utc::now()),
        }
    }

    /// Moves the cursor forward by `count` slots: `(index + count) mod len`
    pub fn advance_by(&self, count: usize) -> RotationState {
        if self.genres.is_empty() {
            return self.clone();
        }
        let len = self.genres.len();
        // Both terms stay below len, so the sum cannot overflow
        let index = (self.index % len + count % len) % len;
        let last_genre = if count == 0 {
            self.last_genre.clone()
        } else {
            Some(self.genres[(index + len - 1) % len].clone())
        };

        RotationState {
            genres: self.genres.clone(),
            index,
            last_genre,
            updated_at: Some(Utc::now()),
        }
    }

    /// Brings a hand-edited or stale cursor back into range
    pub fn normalized(mut self) -> Self {
        if self.genres.is_empty() {
            self.index = 0;
        } else {
            self.index %= self.genres.len();
        }
        self
    }
}
