//! Collection coordinator - main orchestration logic
//!
//! This module drives one genre at a time through the pipeline:
//! - Checking the genre checkpoint (skip, resume or start over)
//! - Discovering artists through the strategy chain
//! - Fetching top tracks and persisting every response to the raw layer
//! - Validating, loading, and only then committing the checkpoint
//!
//! Batch and collect-all runs call the single-genre path in sequence.

use crate::catalog::RawBatch;
use crate::collector::discovery::DiscoveryChain;
use crate::collector::scheduler::Scheduler;
use crate::collector::traits::CatalogApi;
use crate::config::Config;
use crate::output::{write_ranking, Counter, Metrics, MetricsSink, Timer};
use crate::state::{GenreCheckpoint, GenreStatus, RotationState};
use crate::storage::{
    CheckpointStore, DataLayout, JsonCheckpointStore, Loader, RunStatus, RunSummary,
    SqliteStorage, TrackStore,
};
use crate::validation::validate_and_normalize;
use crate::{ApiError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Largest number of genres a single batch may process
pub const MAX_BATCH_GENRES: usize = 1000;

/// Parameters of a single-genre collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectRequest {
    pub genre: String,
    /// Artists to fetch in this run
    pub quantity: usize,
    pub market: String,
    /// Move the existing checkpoint aside and start over
    pub force: bool,
}

impl CollectRequest {
    pub fn new(genre: impl Into<String>, quantity: usize, market: impl Into<String>) -> Self {
        Self {
            genre: genre.into(),
            quantity,
            market: market.into(),
            force: false,
        }
    }

    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    fn for_genre(&self, genre: &str) -> Self {
        Self {
            genre: genre.to_string(),
            ..self.clone()
        }
    }
}

/// What a single-genre collection did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionResult {
    pub genre: String,
    pub status: GenreStatus,
    /// Artists whose top tracks were fetched in this run
    pub artists_collected: usize,
    /// Validated tracks loaded in this run
    pub tracks_collected: usize,
    /// Artist-level fetch failures
    pub errors: usize,
    /// Records dropped by validation
    pub violations: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Discovery strategy that produced the artists
    pub strategy: Option<String>,
    /// True when the checkpoint said there was nothing to do
    pub skipped: bool,
}

impl CollectionResult {
    fn skipped(checkpoint: &GenreCheckpoint) -> Self {
        Self {
            genre: checkpoint.genre.clone(),
            status: checkpoint.status,
            strategy: checkpoint.strategy.clone(),
            skipped: true,
            ..Self::default()
        }
    }
}

/// A genre whose collection ended with an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreFailure {
    pub genre: String,
    pub error: String,
}

/// Outcome of a batch or collect-all run
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub results: Vec<CollectionResult>,
    pub failures: Vec<GenreFailure>,
    /// Rotation persisted at the end of a batch run
    pub rotation: Option<RotationState>,
}

impl BatchOutcome {
    /// True if any genre ended `failed`
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
            || self
                .results
                .iter()
                .any(|r| r.status == GenreStatus::Failed)
    }

    pub fn genres_processed(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    pub fn tracks_collected(&self) -> usize {
        self.results.iter().map(|r| r.tracks_collected).sum()
    }

    pub fn errors(&self) -> usize {
        self.results.iter().map(|r| r.errors).sum::<usize>() + self.failures.len()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            genres_processed: self.genres_processed() as u64,
            tracks_loaded: self.tracks_collected() as u64,
            errors: self.errors() as u64,
        }
    }
}

/// Main collection coordinator structure
pub struct Coordinator<A> {
    api: A,
    storage: Box<dyn TrackStore>,
    checkpoints: Box<dyn CheckpointStore>,
    layout: DataLayout,
    discovery: DiscoveryChain,
    metrics: Arc<Metrics>,
    genres: Vec<String>,
    ranking_size: usize,
}

impl<A: CatalogApi> Coordinator<A> {
    /// Creates a coordinator over explicit collaborators
    pub fn new(
        api: A,
        storage: Box<dyn TrackStore>,
        checkpoints: Box<dyn CheckpointStore>,
        layout: DataLayout,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            api,
            storage,
            checkpoints,
            layout,
            discovery: DiscoveryChain::default(),
            metrics,
            genres: Vec::new(),
            ranking_size: 20,
        }
    }

    /// Creates a coordinator backed by the data directory of `config`
    ///
    /// # Arguments
    ///
    /// * `config` - The effective configuration
    /// * `api` - The catalog API client
    /// * `metrics` - Run metrics shared with the API client
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Storage opened and schema ready
    /// * `Err(HarvestError)` - The database could not be opened
    pub fn from_config(config: &Config, api: A, metrics: Arc<Metrics>) -> Result<Self> {
        let layout = DataLayout::new(&config.output.data_dir);
        let storage = SqliteStorage::new(&config.output.database_path())?;
        let checkpoints =
            JsonCheckpointStore::new(layout.checkpoints_dir(), config.output.rotation_path());

        Ok(Self::new(api, Box::new(storage), Box::new(checkpoints), layout, metrics)
            .with_discovery(DiscoveryChain::standard(
                config.api.playlist_candidates as usize,
            ))
            .with_genres(config.collection.genres.clone())
            .with_ranking_size(config.collection.ranking_size))
    }

    pub fn with_discovery(mut self, discovery: DiscoveryChain) -> Self {
        self.discovery = discovery;
        self
    }

    /// Genres used to initialize a missing rotation
    pub fn with_genres(mut self, genres: Vec<String>) -> Self {
        self.genres = genres;
        self
    }

    pub fn with_ranking_size(mut self, size: usize) -> Self {
        self.ranking_size = size.max(1);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn storage(&self) -> &dyn TrackStore {
        self.storage.as_ref()
    }

    pub fn checkpoints(&self) -> &dyn CheckpointStore {
        self.checkpoints.as_ref()
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Records the start of an invocation in the `runs` table
    pub fn start_run(&mut self, mode: &str, config_hash: &str) -> Result<i64> {
        let run_id = self.storage.create_run(mode, config_hash)?;
        info!(run_id, mode = %mode, "Run started");
        Ok(run_id)
    }

    /// Records the end of an invocation
    pub fn finish_run(&mut self, run_id: i64, status: RunStatus, summary: &RunSummary) -> Result<()> {
        self.storage.complete_run(run_id, status, summary)?;
        info!(
            run_id,
            status = status.to_db_string(),
            genres = summary.genres_processed,
            tracks = summary.tracks_loaded,
            errors = summary.errors,
            "Run finished"
        );
        Ok(())
    }

    /// Collects one genre
    ///
    /// # Flow
    ///
    /// 1. `force` moves the checkpoint to a timestamped `*.bak`
    /// 2. A `done` or `empty` checkpoint ends the call without any API traffic
    /// 3. Discovery; no artist at all marks the genre `empty`
    /// 4. Top tracks per artist, each response stored in the raw layer
    /// 5. Validation, processed file, database upsert
    /// 6. Checkpoint commit
    ///
    /// An artist whose fetch fails after retries counts as an error and the
    /// loop moves on. A fatal API error stops the loop; what was fetched is
    /// still loaded, the genre is marked `failed` and the error is returned.
    pub async fn collect(&mut self, request: &CollectRequest) -> Result<CollectionResult> {
        let genre = request.genre.trim();
        let started = Instant::now();

        if request.force && self.checkpoints.reset_checkpoint(genre)? {
            info!(genre = %genre, "Moved existing checkpoint aside");
        }

        let mut checkpoint = self
            .checkpoints
            .load_checkpoint(genre)?
            .unwrap_or_else(|| GenreCheckpoint::new(genre));

        if checkpoint.status.is_settled() {
            info!(
                genre = %genre,
                status = %checkpoint.status,
                "Genre already collected, skipping (use --force to collect again)"
            );
            self.metrics.incr(Counter::GenresSkipped, 1);
            return Ok(CollectionResult::skipped(&checkpoint));
        }

        if checkpoint.status.is_error() {
            info!(
                genre = %genre,
                processed = checkpoint.processed_artists.len(),
                "Resuming failed genre"
            );
        }

        let wanted = request
            .quantity
            .saturating_add(checkpoint.processed_artists.len());
        let discovery = match self
            .discovery
            .discover_artists(&self.api, genre, wanted)
            .await
        {
            Ok(discovery) => discovery,
            Err(e) => {
                error!(genre = %genre, error = %e, "Artist discovery failed");
                checkpoint.finish(GenreStatus::Failed, 0, 1);
                self.checkpoints.save_checkpoint(&checkpoint)?;
                self.metrics.incr(Counter::GenresFailed, 1);
                return Err(e.into());
            }
        };

        if discovery.is_empty() {
            warn!(genre = %genre, "No artists found by any strategy, marking genre empty");
            checkpoint.mark_empty();
            self.checkpoints.save_checkpoint(&checkpoint)?;
            self.metrics.incr(Counter::GenresEmpty, 1);
            return Ok(CollectionResult {
                genre: genre.to_string(),
                status: GenreStatus::Empty,
                ..CollectionResult::default()
            });
        }

        checkpoint.strategy = discovery.strategy.map(str::to_string);
        let pending: Vec<_> = discovery
            .artists
            .into_iter()
            .filter(|artist| !checkpoint.has_processed(&artist.id))
            .take(request.quantity)
            .collect();

        let mut batch = RawBatch::new(genre, &request.market);
        let mut errors = 0;
        let mut fatal: Option<ApiError> = None;

        for artist in pending {
            self.layout.write_raw(genre, "artist", &artist.id, &artist.raw)?;

            match self.api.artist_top_tracks(&artist.id, &request.market).await {
                Ok(top_tracks) => {
                    self.layout
                        .write_raw(genre, "top_tracks", &artist.id, &top_tracks)?;
                    self.metrics.incr(Counter::ArtistsFetched, 1);
                    info!(genre = %genre, artist_id = %artist.id, artist = %artist.name, "Fetched top tracks");
                    batch.push(artist, top_tracks);
                }
                Err(e) if e.is_fatal() => {
                    errors += 1;
                    self.metrics.incr(Counter::ArtistErrors, 1);
                    error!(genre = %genre, artist_id = %artist.id, error = %e, "Fatal API error, stopping genre");
                    fatal = Some(e);
                    break;
                }
                Err(e) => {
                    errors += 1;
                    self.metrics.incr(Counter::ArtistErrors, 1);
                    warn!(genre = %genre, artist_id = %artist.id, error = %e, "Skipping artist");
                }
            }
        }

        let report = validate_and_normalize(&batch);
        self.metrics
            .incr(Counter::SchemaViolations, report.violations.len() as u64);

        let loaded = Loader::new(&self.layout, self.storage.as_mut(), self.metrics.as_ref())
            .load(genre, &report.records, batch.collected_at)?;

        // Records are durable from here on. Only artists with at least one
        // loaded track count as processed.
        let with_tracks: HashSet<&str> = report
            .records
            .iter()
            .map(|record| record.artist_id.as_str())
            .collect();
        let loaded_artists: Vec<String> = batch
            .artist_ids()
            .into_iter()
            .filter(|id| with_tracks.contains(id.as_str()))
            .collect();
        let newly_processed = loaded_artists.len();
        checkpoint.record_artists(loaded_artists);
        let status = if fatal.is_some() || checkpoint.processed_artists.is_empty() {
            GenreStatus::Failed
        } else {
            GenreStatus::Done
        };
        checkpoint.finish(status, report.records.len(), errors);
        self.checkpoints.save_checkpoint(&checkpoint)?;

        self.metrics
            .observe(Timer::GenreDuration, started.elapsed());
        match status {
            GenreStatus::Done => self.metrics.incr(Counter::GenresDone, 1),
            _ => self.metrics.incr(Counter::GenresFailed, 1),
        }

        info!(
            genre = %genre,
            status = %status,
            artists = batch.entries.len(),
            loaded_artists = newly_processed,
            tracks = report.records.len(),
            errors,
            violations = report.violations.len(),
            "Genre collection finished"
        );

        if let Some(e) = fatal {
            return Err(e.into());
        }

        Ok(CollectionResult {
            genre: genre.to_string(),
            status,
            artists_collected: batch.entries.len(),
            tracks_collected: report.records.len(),
            errors,
            violations: report.violations.len(),
            inserted: loaded.result.inserted,
            updated: loaded.result.updated,
            strategy: checkpoint.strategy.clone(),
            skipped: false,
        })
    }

    /// Loads the rotation, or builds a fresh one from the genre sources
    pub async fn scheduler(&self) -> Result<Scheduler> {
        Scheduler::load(self.checkpoints.as_ref(), &self.genres, &self.api).await
    }

    /// Processes the next `count` genres of the rotation
    ///
    /// Errors of individual genres are recorded and the batch moves on. The
    /// advanced cursor is persisted once, after the last genre. `count` is
    /// capped at [`MAX_BATCH_GENRES`].
    pub async fn run_batch(&mut self, count: usize, template: &CollectRequest) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        if count == 0 {
            return Ok(outcome);
        }
        let count = count.min(MAX_BATCH_GENRES);

        let scheduler = self.scheduler().await?;
        let plan = scheduler.plan(count);
        info!(batch = count, genres = ?plan, "Starting batch");

        for genre in &plan {
            self.collect_into(&template.for_genre(genre), &mut outcome)
                .await;
        }

        let next = scheduler.advance(count);
        self.checkpoints.save_rotation(&next)?;
        info!(
            index = next.index,
            total_genres = next.len(),
            "Rotation updated"
        );
        outcome.rotation = Some(next);

        Ok(outcome)
    }

    /// Collects every genre of the list and writes a ranking after each one
    pub async fn run_collect_all(&mut self, template: &CollectRequest) -> Result<BatchOutcome> {
        let genres = self.scheduler().await?.genres().to_vec();
        info!(genres = genres.len(), "Collecting all genres");

        let mut outcome = BatchOutcome::default();
        for genre in &genres {
            let ok = self
                .collect_into(&template.for_genre(genre), &mut outcome)
                .await;
            if !ok {
                continue;
            }

            match write_ranking(
                &self.layout,
                self.storage.as_ref(),
                genre,
                self.ranking_size,
                chrono::Utc::now(),
            ) {
                Ok(Some(path)) => {
                    info!(genre = %genre, path = %path.display(), "Ranking written")
                }
                Ok(None) => {}
                Err(e) => warn!(genre = %genre, error = %e, "Failed to write ranking"),
            }
        }

        Ok(outcome)
    }

    /// Runs one genre and files the result; returns false on error
    async fn collect_into(&mut self, request: &CollectRequest, outcome: &mut BatchOutcome) -> bool {
        match self.collect(request).await {
            Ok(result) => {
                outcome.results.push(result);
                true
            }
            Err(e) => {
                error!(genre = %request.genre, error = %e, "Genre failed");
                outcome.failures.push(GenreFailure {
                    genre: request.genre.clone(),
                    error: e.to_string(),
                });
                false
            }
        }
    }
}

