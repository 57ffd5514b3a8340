//! Output module for run reports
//!
//! This module handles:
//! - Recording run metrics in a Prometheus registry and exporting them
//! - Writing per-genre popularity rankings
//! - Displaying database statistics

mod metrics;
mod ranking;
pub mod stats;

pub use metrics::{Counter, Metrics, MetricsSink, MetricsSnapshot, Timer, TimerStats};
pub use ranking::{top_tracks, write_ranking, RankedTrack};
pub use stats::{load_statistics, print_statistics, CollectionStatistics};
