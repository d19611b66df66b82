//! # vector-sync CLI
//!
//! ```bash
//! vector-sync sync                          # HEAD since the last synced commit
//! vector-sync sync --since-commit HEAD~5    # explicit baseline
//! vector-sync sync --dry-run --json         # simulate and print the report
//! vector-sync status                        # stored state and index counts
//! vector-sync reset                         # forget the last synced commit
//! ```
//!
//! Logs go to stderr; `--json` output goes to stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use vector_sync::config::Config;
use vector_sync::error::SyncError;
use vector_sync::paths::PlatformPaths;
use vector_sync::repo::GitDiffSource;
use vector_sync::state::{SyncLock, SyncStateStore};
use vector_sync::sync::SyncOrchestrator;
use vector_sync::types::{SyncOptions, SyncReport};

#[derive(Parser)]
#[command(
    name = "vector-sync",
    version,
    long_version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("VECTOR_SYNC_COMMIT"),
        ", built ",
        env!("VECTOR_SYNC_BUILT_AT"),
        ")"
    ),
    about = "Incrementally synchronize a git repository into a vector index"
)]
struct Cli {
    /// Configuration file (defaults to <repo>/.vector-sync.toml, then the user config)
    #[arg(long, global = true, env = "VECTOR_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Repository working tree
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bring the index up to date with HEAD
    Sync {
        /// Baseline commit instead of the stored last synced commit
        #[arg(long)]
        since_commit: Option<String>,

        /// Process the range even if the index is already at HEAD
        #[arg(long)]
        force: bool,

        /// Classify, chunk and report without touching the index or state
        #[arg(long)]
        dry_run: bool,

        /// Also index files classified as tests
        #[arg(long)]
        include_tests: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the stored sync state and index statistics
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Delete the stored sync state
    Reset,

    /// Query the index
    Search {
        query: String,

        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::new(cli.config.as_deref(), &cli.repo)?;

    match cli.command {
        Command::Sync {
            since_commit,
            force,
            dry_run,
            include_tests,
            json,
        } => {
            let orchestrator = SyncOrchestrator::from_config(&config, &cli.repo).await?;
            let options = SyncOptions {
                since_commit,
                force,
                dry_run,
                include_tests: include_tests.then_some(true),
            };

            match orchestrator.run(options).await {
                Ok(report) => {
                    print_report(&report, json)?;
                    Ok(exit_code(&report))
                }
                Err(SyncError::StatePersistence { report, source }) => {
                    print_report(&report, json)?;
                    Err(anyhow::Error::new(source).context(format!(
                        "index is at {} but {} was not updated",
                        report.to_commit,
                        orchestrator.store().path().display()
                    )))
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::Status { json } => {
            let orchestrator = SyncOrchestrator::from_config(&config, &cli.repo).await?;
            let state = orchestrator.state()?;
            let stats = orchestrator.index_stats().await?;

            if json {
                let value = serde_json::json!({ "state": state, "index": stats });
                println!("{}", serde_json::to_string_pretty(&value)?);
                return Ok(ExitCode::SUCCESS);
            }

            match state {
                Some(state) => {
                    println!("Repository:        {}", state.repository.name);
                    println!(
                        "Last synced:       {} ({})",
                        state.last_synced_commit().unwrap_or("-"),
                        state
                            .processing
                            .last_synced_at
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| "never".to_string())
                    );
                    println!("Status:            {:?}", state.processing.status);
                    println!(
                        "Index:             {} / {} ({} dims)",
                        state.vectorization.provider,
                        state.vectorization.namespace,
                        state.vectorization.embedding_dimension
                    );
                    println!(
                        "Totals:            {} files, {} chunks, {} vectors, {} errors over {} runs",
                        state.stats.files_processed,
                        state.stats.chunks_created,
                        state.stats.vectors_stored,
                        state.stats.error_count,
                        state.stats.runs
                    );
                }
                None => println!("Never synced ({})", orchestrator.store().path().display()),
            }
            println!(
                "Vectors in '{}':   {}",
                orchestrator.namespace(),
                stats.total_vectors
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Reset => {
            let store = state_store(&config, &cli.repo)?;
            let _lock = SyncLock::try_acquire(store.path())?
                .ok_or_else(|| SyncError::RunInProgress(store.path().display().to_string()))?;

            if store.reset()? {
                println!("Removed {}", store.path().display());
            } else {
                println!("No sync state at {}", store.path().display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Search { query, top_k } => {
            let orchestrator = SyncOrchestrator::from_config(&config, &cli.repo).await?;
            let matches = orchestrator.search(&query, top_k, None).await?;

            for m in matches {
                let field = |key: &str| {
                    m.metadata
                        .get(key)
                        .map(|v| v.to_string().trim_matches('"').to_string())
                        .unwrap_or_default()
                };
                println!(
                    "{:.3}  {}:{}-{}",
                    m.score,
                    field("file_path"),
                    field("start_line"),
                    field("end_line")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn state_store(config: &Config, repo: &Path) -> Result<SyncStateStore> {
    let source = GitDiffSource::discover(repo).context("Failed to open repository")?;
    Ok(SyncStateStore::new(PlatformPaths::resolve_state_path(
        source.root(),
        &config.sync.state_file,
    )))
}

fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let stats = &report.stats;
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    println!(
        "{}{} -> {}: {:?}",
        prefix,
        short(&report.from_commit),
        short(&report.to_commit),
        report.outcome
    );
    println!(
        "  files: {} ({} added, {} modified, {} renamed, {} deleted, {} skipped)",
        stats.total_files,
        stats.added_files,
        stats.modified_files,
        stats.renamed_files,
        stats.deleted_files,
        stats.skipped_files
    );
    println!(
        "  chunks: {}, embeddings: {} ({} failed), upserted: {}, deleted: {}",
        stats.total_chunks,
        stats.total_embeddings,
        stats.failed_embeddings,
        stats.vectors_upserted,
        stats.vectors_deleted
    );
    println!("  errors: {}, {}ms", stats.error_count, stats.duration_ms);
    for error in &report.errors {
        println!("    {}", error);
    }
    Ok(())
}

fn exit_code(report: &SyncReport) -> ExitCode {
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn short(commit: &str) -> &str {
    commit.get(..8).unwrap_or(commit)
}
