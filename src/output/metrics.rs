//! Run metrics backed by a Prometheus registry
//!
//! Every run owns its own registry. At the end of a run the registry is
//! written twice: as Prometheus text exposition (`.prom`, suitable for a
//! node-exporter textfile collector) and as a JSON snapshot read by humans.

use crate::storage::{write_bytes_atomic, write_json_atomic};
use chrono::{DateTime, Utc};
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Metric name prefix for all Genre-Harvest metrics
const PREFIX: &str = "genre_harvest";

const API_LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];
const GENRE_DURATION_BUCKETS: &[f64] = &[1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0];

/// Counters recorded during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    ApiCalls,
    ApiRetries,
    ApiRateLimited,
    ApiErrors,
    ArtistsFetched,
    ArtistErrors,
    SchemaViolations,
    TracksInserted,
    TracksUpdated,
    GenresDone,
    GenresFailed,
    GenresEmpty,
    GenresSkipped,
}

impl Counter {
    pub const ALL: [Counter; 13] = [
        Counter::ApiCalls,
        Counter::ApiRetries,
        Counter::ApiRateLimited,
        Counter::ApiErrors,
        Counter::ArtistsFetched,
        Counter::ArtistErrors,
        Counter::SchemaViolations,
        Counter::TracksInserted,
        Counter::TracksUpdated,
        Counter::GenresDone,
        Counter::GenresFailed,
        Counter::GenresEmpty,
        Counter::GenresSkipped,
    ];

    /// Key used in the JSON snapshot
    pub fn name(self) -> &'static str {
        match self {
            Counter::ApiCalls => "api_calls",
            Counter::ApiRetries => "api_retries",
            Counter::ApiRateLimited => "api_rate_limited",
            Counter::ApiErrors => "api_errors",
            Counter::ArtistsFetched => "artists_fetched",
            Counter::ArtistErrors => "artist_errors",
            Counter::SchemaViolations => "schema_violations",
            Counter::TracksInserted => "tracks_inserted",
            Counter::TracksUpdated => "tracks_updated",
            Counter::GenresDone => "genres_done",
            Counter::GenresFailed => "genres_failed",
            Counter::GenresEmpty => "genres_empty",
            Counter::GenresSkipped => "genres_skipped",
        }
    }
}

/// Timers recorded during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    ApiLatency,
    GenreDuration,
}

impl Timer {
    pub const ALL: [Timer; 2] = [Timer::ApiLatency, Timer::GenreDuration];

    pub fn name(self) -> &'static str {
        match self {
            Timer::ApiLatency => "api_latency",
            Timer::GenreDuration => "genre_duration",
        }
    }
}

/// Receiver for counters and timers
pub trait MetricsSink: Send + Sync {
    fn incr(&self, counter: Counter, by: u64);

    fn observe(&self, timer: Timer, elapsed: Duration);
}

/// Aggregated timer values in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerStats {
    pub count: u64,
    pub total_ms: u64,
}

impl TimerStats {
    pub fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms as f64 / self.count as f64
        }
    }
}

/// Point-in-time copy of all metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub timers: BTreeMap<String, TimerStats>,
}

impl MetricsSnapshot {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }
}

/// Per-run Prometheus registry and its metric families
pub struct Metrics {
    registry: Registry,
    api_requests: IntCounter,
    api_errors: IntCounterVec,
    artists: IntCounterVec,
    tracks: IntCounterVec,
    genres: IntCounterVec,
    api_latency: Histogram,
    genre_duration: Histogram,
    last_run: Gauge,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let api_requests = IntCounter::new(
            format!("{PREFIX}_api_requests_total"),
            "Total HTTP requests sent to the catalog API",
        )?;
        let api_errors = IntCounterVec::new(
            Opts::new(
                format!("{PREFIX}_api_errors_total"),
                "Failed catalog API attempts by handling",
            ),
            &["kind"],
        )?;
        let artists = IntCounterVec::new(
            Opts::new(
                format!("{PREFIX}_artists_processed_total"),
                "Artists whose top tracks were requested",
            ),
            &["outcome"],
        )?;
        let tracks = IntCounterVec::new(
            Opts::new(
                format!("{PREFIX}_tracks_processed_total"),
                "Track records by load outcome",
            ),
            &["outcome"],
        )?;
        let genres = IntCounterVec::new(
            Opts::new(format!("{PREFIX}_genres_total"), "Genres by final status"),
            &["status"],
        )?;
        let api_latency = Histogram::with_opts(
            HistogramOpts::new(
                format!("{PREFIX}_api_request_duration_seconds"),
                "Catalog API request duration in seconds",
            )
            .buckets(API_LATENCY_BUCKETS.to_vec()),
        )?;
        let genre_duration = Histogram::with_opts(
            HistogramOpts::new(
                format!("{PREFIX}_genre_duration_seconds"),
                "Wall time spent collecting one genre",
            )
            .buckets(GENRE_DURATION_BUCKETS.to_vec()),
        )?;
        let last_run = Gauge::new(
            format!("{PREFIX}_last_run_timestamp_seconds"),
            "Unix time at which the last run finished",
        )?;

        registry.register(Box::new(api_requests.clone()))?;
        registry.register(Box::new(api_errors.clone()))?;
        registry.register(Box::new(artists.clone()))?;
        registry.register(Box::new(tracks.clone()))?;
        registry.register(Box::new(genres.clone()))?;
        registry.register(Box::new(api_latency.clone()))?;
        registry.register(Box::new(genre_duration.clone()))?;
        registry.register(Box::new(last_run.clone()))?;

        let metrics = Self {
            registry,
            api_requests,
            api_errors,
            artists,
            tracks,
            genres,
            api_latency,
            genre_duration,
            last_run,
        };

        // Zero-valued series show up in the exposition from the start
        for counter in Counter::ALL {
            let _ = metrics.counter(counter);
        }
        Ok(metrics)
    }

    fn counter(&self, counter: Counter) -> IntCounter {
        match counter {
            Counter::ApiCalls => self.api_requests.clone(),
            Counter::ApiRetries => self.api_errors.with_label_values(&["retried"]),
            Counter::ApiRateLimited => self.api_errors.with_label_values(&["rate_limited"]),
            Counter::ApiErrors => self.api_errors.with_label_values(&["failed"]),
            Counter::ArtistsFetched => self.artists.with_label_values(&["fetched"]),
            Counter::ArtistErrors => self.artists.with_label_values(&["error"]),
            Counter::SchemaViolations => self.tracks.with_label_values(&["rejected"]),
            Counter::TracksInserted => self.tracks.with_label_values(&["inserted"]),
            Counter::TracksUpdated => self.tracks.with_label_values(&["updated"]),
            Counter::GenresDone => self.genres.with_label_values(&["done"]),
            Counter::GenresFailed => self.genres.with_label_values(&["failed"]),
            Counter::GenresEmpty => self.genres.with_label_values(&["empty"]),
            Counter::GenresSkipped => self.genres.with_label_values(&["skipped"]),
        }
    }

    fn histogram(&self, timer: Timer) -> &Histogram {
        match timer {
            Timer::ApiLatency => &self.api_latency,
            Timer::GenreDuration => &self.genre_duration,
        }
    }

    /// Stamps the end of the run
    pub fn mark_finished(&self, at: DateTime<Utc>) {
        self.last_run.set(at.timestamp_millis() as f64 / 1000.0);
    }

    pub fn last_finished(&self) -> f64 {
        self.last_run.get()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = Counter::ALL
            .iter()
            .map(|&c| (c.name().to_string(), self.counter(c).get()))
            .collect();
        let timers = Timer::ALL
            .iter()
            .map(|&t| {
                let histogram = self.histogram(t);
                let stats = TimerStats {
                    count: histogram.get_sample_count(),
                    total_ms: (histogram.get_sample_sum() * 1000.0).round() as u64,
                };
                (t.name().to_string(), stats)
            })
            .collect();

        MetricsSnapshot { counters, timers }
    }

    /// Renders the registry in the Prometheus text format
    pub fn export_text(&self) -> prometheus::Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    /// Writes the text exposition to `prom_path` and the snapshot to `json_path`
    pub fn save(&self, prom_path: &Path, json_path: &Path) -> crate::Result<()> {
        let exposition = self.export_text()?;
        write_bytes_atomic(prom_path, &exposition)?;
        write_json_atomic(json_path, &self.snapshot())?;
        Ok(())
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl MetricsSink for Metrics {
    fn incr(&self, counter: Counter, by: u64) {
        self.counter(counter).inc_by(by);
    }

    fn observe(&self, timer: Timer, elapsed: Duration) {
        self.histogram(timer).observe(elapsed.as_secs_f64());
    }
}
