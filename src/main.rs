//! Genre-Harvest main entry point
//!
//! This is the command-line interface for the Genre-Harvest collector.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use genre_harvest::collector::{
    BatchOutcome, CatalogApi, CollectRequest, CollectionResult, Coordinator, Credentials,
    RetryPolicy, SpotifyClient, MAX_BATCH_GENRES,
};
use genre_harvest::config::{apply_env, load_or_default, validate, Config, MAX_QUANTITY};
use genre_harvest::output::{load_statistics, print_statistics, Metrics};
use genre_harvest::storage::{open_storage, JsonCheckpointStore, RunStatus, RunSummary};
use genre_harvest::{GenreStatus, HarvestError};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Genre-Harvest: a genre-rotating Spotify catalog collector
///
/// Genre-Harvest discovers artists by genre, stores their top tracks as raw
/// and processed JSON, and loads them into a local SQLite database. Per-genre
/// checkpoints and a rotation file make repeated runs resume where the
/// previous one stopped.
#[derive(Parser, Debug)]
#[command(name = "genre-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A genre-rotating Spotify catalog collector", long_about = None)]
struct Cli {
    /// Genre to collect (single-genre mode)
    #[arg(short, long)]
    genre: Option<String>,

    /// Number of artists to collect per genre
    #[arg(short = 'n', long)]
    quantity: Option<usize>,

    /// Market code for top tracks (e.g. BR)
    #[arg(short, long)]
    market: Option<String>,

    /// Move existing checkpoints aside and collect again
    #[arg(long)]
    force: bool,

    /// Never prompt; use flags, environment and configuration
    #[arg(long)]
    no_interactive: bool,

    /// Collect every genre of the genre list and write rankings
    #[arg(long, conflicts_with_all = ["batch_genres", "stats"])]
    collect_all: bool,

    /// Process this many genres from the rotation, then advance it
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..=MAX_BATCH_GENRES as u64), conflicts_with_all = ["collect_all", "stats"])]
    batch_genres: Option<u64>,

    /// Rotation state file (default: <data-dir>/checkpoints/genre_rotation.json)
    #[arg(long, value_name = "PATH")]
    rotation_file: Option<PathBuf>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Data directory for raw, processed, checkpoint and database files
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["collect_all", "batch_genres"])]
    stats: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// True when single-genre mode should ask for its parameters
    fn wants_prompt(&self) -> bool {
        !self.no_interactive
            && self.genre.is_none()
            && self.quantity.is_none()
            && self.market.is_none()
            && !self.force
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet, cli.log_format);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` replaces the verbosity-derived filter when set.
fn setup_logging(verbose: u8, quiet: bool, format: LogFormat) {
    let default_filter = if quiet {
        // Only show errors
        "error"
    } else {
        match verbose {
            0 => "genre_harvest=info,warn",
            1 => "genre_harvest=debug,info",
            2 => "genre_harvest=trace,debug",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Resolves configuration: defaults, file, environment, then flags
fn effective_config(cli: &Cli) -> anyhow::Result<(Config, String)> {
    let (mut config, hash) =
        load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    apply_env(&mut config).context("Invalid environment override")?;

    if let Some(genre) = &cli.genre {
        config.collection.genre = genre.trim().to_string();
    }
    if let Some(quantity) = cli.quantity {
        config.collection.quantity = quantity;
    }
    if let Some(market) = &cli.market {
        config.collection.market = market.trim().to_uppercase();
    }
    if let Some(data_dir) = &cli.data_dir {
        config.output.data_dir = data_dir.clone();
    }
    if let Some(rotation_file) = &cli.rotation_file {
        config.output.rotation_file = Some(rotation_file.clone());
    }

    validate(&config).context("Invalid command-line value")?;
    Ok((config, hash))
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let (config, config_hash) = effective_config(&cli)?;
    info!(config_hash = %config_hash, data_dir = %config.output.data_dir.display(), "Configuration loaded");

    if cli.stats {
        handle_stats(&config)?;
        return Ok(ExitCode::SUCCESS);
    }

    let credentials = Credentials::from_env();
    if credentials.is_none() {
        info!("SPOTIFY_CLIENT_ID/SPOTIFY_CLIENT_SECRET not set; API calls will fail");
    }

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
    let client = SpotifyClient::new(
        &config.api,
        RetryPolicy::from_config(&config.retry),
        credentials,
        metrics.clone(),
    )
    .context("Failed to build HTTP client")?;
    let mut coordinator = Coordinator::from_config(&config, client, metrics.clone())?;

    let template = CollectRequest::new(
        config.collection.genre.clone(),
        config.collection.quantity,
        config.collection.market.clone(),
    )
    .forced(cli.force);

    let code = if let Some(count) = cli.batch_genres {
        let run_id = coordinator.start_run("batch", &config_hash)?;
        let outcome = coordinator
            .run_batch(usize::try_from(count).unwrap_or(MAX_BATCH_GENRES), &template)
            .await;
        finish_batch(&mut coordinator, run_id, outcome)?
    } else if cli.collect_all {
        let run_id = coordinator.start_run("collect-all", &config_hash)?;
        let outcome = coordinator.run_collect_all(&template).await;
        finish_batch(&mut coordinator, run_id, outcome)?
    } else {
        let request = if cli.wants_prompt() {
            let genres = coordinator.api().available_genres().await;
            let stdin = io::stdin();
            let mut input = stdin.lock();
            match prompt_request(&mut input, &mut io::stdout(), &genres, &template)? {
                Some(request) => request,
                None => {
                    info!("Interactive input cancelled");
                    return Ok(ExitCode::FAILURE);
                }
            }
        } else {
            template
        };

        let run_id = coordinator.start_run("single", &config_hash)?;
        let result = coordinator.collect(&request).await;
        finish_single(&mut coordinator, run_id, result)?
    };

    let finished = Utc::now();
    metrics.mark_finished(finished);
    let prom_path = coordinator.layout().prometheus_path(finished);
    let json_path = coordinator.layout().metrics_path(finished);
    match metrics.save(&prom_path, &json_path) {
        Ok(()) => info!(path = %prom_path.display(), "Metrics written"),
        Err(e) => warn!(error = %e, "Failed to write metrics"),
    }

    Ok(code)
}

/// Records a single-genre run and prints its summary
fn finish_single<A: CatalogApi>(
    coordinator: &mut Coordinator<A>,
    run_id: i64,
    result: Result<CollectionResult, HarvestError>,
) -> anyhow::Result<ExitCode> {
    match result {
        Ok(result) => {
            let status = if result.status == GenreStatus::Failed {
                RunStatus::Failed
            } else {
                RunStatus::Completed
            };
            let summary = RunSummary {
                genres_processed: 1,
                tracks_loaded: result.tracks_collected as u64,
                errors: result.errors as u64,
            };
            coordinator.finish_run(run_id, status, &summary)?;
            print_result(&result);

            Ok(if status == RunStatus::Failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Err(e) => {
            let summary = RunSummary {
                genres_processed: 1,
                tracks_loaded: 0,
                errors: 1,
            };
            coordinator.finish_run(run_id, RunStatus::Failed, &summary)?;
            Err(e).context("Collection failed")
        }
    }
}

/// Records a batch or collect-all run and prints its summary
fn finish_batch<A: CatalogApi>(
    coordinator: &mut Coordinator<A>,
    run_id: i64,
    outcome: Result<BatchOutcome, HarvestError>,
) -> anyhow::Result<ExitCode> {
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            coordinator.finish_run(run_id, RunStatus::Failed, &Default::default())?;
            return Err(e).context("Batch failed");
        }
    };

    let status = if outcome.has_failures() {
        RunStatus::Partial
    } else {
        RunStatus::Completed
    };
    coordinator.finish_run(run_id, status, &outcome.summary())?;

    println!("=== Batch Summary ===\n");
    for result in &outcome.results {
        print_result(result);
    }
    for failure in &outcome.failures {
        println!("  {}: error ({})", failure.genre, failure.error);
    }
    println!();
    println!(
        "Genres: {}, tracks: {}, errors: {}",
        outcome.genres_processed(),
        outcome.tracks_collected(),
        outcome.errors()
    );
    if let Some(rotation) = &outcome.rotation {
        println!(
            "Next genre: {} (index {} of {})",
            rotation.next_genre().unwrap_or("-"),
            rotation.index,
            rotation.len()
        );
    }

    Ok(if outcome.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_result(result: &CollectionResult) {
    if result.skipped {
        println!("  {}: skipped ({})", result.genre, result.status);
        return;
    }
    println!(
        "  {}: {} - {} artists, {} tracks ({} new, {} updated), {} errors, {} dropped{}",
        result.genre,
        result.status,
        result.artists_collected,
        result.tracks_collected,
        result.inserted,
        result.updated,
        result.errors,
        result.violations,
        result
            .strategy
            .as_deref()
            .map(|s| format!(" via {}", s))
            .unwrap_or_default()
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let database = config.output.database_path();
    println!("Database: {}\n", database.display());

    // Open the database
    let storage = open_storage(&database)?;
    let checkpoints = JsonCheckpointStore::new(
        config.output.data_dir.join("checkpoints"),
        config.output.rotation_path(),
    );

    // Load statistics
    let stats = load_statistics(&storage, &checkpoints)?;

    // Print statistics
    print_statistics(&stats);

    Ok(())
}

/// Writes `question`, reads one line; None on end of input
fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<Option<String>> {
    write!(output, "{}", question)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Asks for genre, quantity, market and force; blank answers keep defaults
///
/// Returns None when input ends before all questions were answered.
fn prompt_request<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    genres: &[String],
    defaults: &CollectRequest,
) -> io::Result<Option<CollectRequest>> {
    let mut request = defaults.clone();

    if genres.is_empty() {
        let Some(answer) = ask(input, output, &format!("Genre [{}]: ", defaults.genre))? else {
            return Ok(None);
        };
        if !answer.is_empty() {
            request.genre = answer;
        }
    } else {
        writeln!(output, "\nAvailable genres:")?;
        for (i, genre) in genres.iter().enumerate() {
            writeln!(output, "  [{}] {}", i, genre)?;
        }
        let question = format!("Select genre number (enter for {}): ", defaults.genre);
        let Some(answer) = ask(input, output, &question)? else {
            return Ok(None);
        };
        if !answer.is_empty() {
            match answer.parse::<usize>().ok().and_then(|i| genres.get(i)) {
                Some(genre) => request.genre = genre.clone(),
                None => info!(input = %answer, "Invalid genre selection, keeping default"),
            }
        }
    }

    let question = format!("Artist quantity [{}]: ", defaults.quantity);
    let Some(answer) = ask(input, output, &question)? else {
        return Ok(None);
    };
    if !answer.is_empty() {
        match answer.parse::<usize>() {
            Ok(quantity) if (1..=MAX_QUANTITY).contains(&quantity) => request.quantity = quantity,
            _ => info!(input = %answer, "Invalid quantity, keeping default"),
        }
    }

    let question = format!("Market (e.g. BR) [{}]: ", defaults.market);
    let Some(answer) = ask(input, output, &question)? else {
        return Ok(None);
    };
    if !answer.is_empty() {
        request.market = answer.to_uppercase();
    }

    let Some(answer) = ask(
        input,
        output,
        "Move existing checkpoint aside and collect again? (y/N): ",
    )?
    else {
        return Ok(None);
    };
    request.force = matches!(answer.to_lowercase().as_str(), "y" | "yes" | "s" | "sim");

    Ok(Some(request))
}
