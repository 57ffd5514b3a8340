//! State module for tracking collection progress
//!
//! # Components
//!
//! - `GenreStatus`: the outcome recorded for a genre (pending, done, empty, failed)
//! - `GenreCheckpoint`: per-genre record used to avoid redundant work
//! - `RotationState`: ordered genre list and cursor for batch runs

mod checkpoint;
mod genre_status;
mod rotation;

// Re-export main types
pub use checkpoint::GenreCheckpoint;
pub use genre_status::GenreStatus;
pub use rotation::RotationState;
