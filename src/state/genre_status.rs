/// Genre status definitions for tracking collection progress
///
/// This module defines every outcome a genre's checkpoint can record.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the last recorded outcome for a genre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenreStatus {
    /// Genre has been seen but no run has completed for it
    #[default]
    Pending,

    /// At least one artist was collected and loaded
    Done,

    /// Neither discovery strategy produced an artist
    Empty,

    /// Discovery or every artist fetch failed, or a fatal error stopped the run
    Failed,
}

impl GenreStatus {
    /// Returns true if a run without `--force` must leave this genre alone
    ///
    /// Empty genres are settled as well: they are only retried when the
    /// operator forces it.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Done | Self::Empty)
    }

    /// Returns true if the status represents a failure
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Empty => "empty",
            Self::Failed => "failed",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "done" => Some(Self::Done),
            "empty" => Some(Self::Empty),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn all() -> [Self; 4] {
        [Self::Pending, Self::Done, Self::Empty, Self::Failed]
    }
}

impl fmt::Display for GenreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
