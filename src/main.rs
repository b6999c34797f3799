//! # Leak Indexer CLI (`lidx`)
//!
//! The `lidx` binary drives the indexer: database initialization, index
//! runs over a leak collection, database statistics, and reset.
//!
//! ## Usage
//!
//! ```bash
//! lidx --config ./config/lidx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lidx init` | Create the SQLite database and run schema migrations |
//! | `lidx index` | Index every pending file in the configured collection |
//! | `lidx stats` | Show leak files per status, hosts, and credentials |
//! | `lidx reset --yes` | Delete all indexed data |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! lidx init --config ./config/lidx.toml
//!
//! # Index with info-level logging
//! lidx index -v
//!
//! # Index another collection with fewer workers
//! lidx index --collection "Collection 2" --workers 8
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use leak_indexer::config::{self, Overrides};
use leak_indexer::ingest::{self, RunOutcome, RunSummary};
use leak_indexer::progress::{format_number, ProgressMode};
use leak_indexer::{db, logging, migrate, stats};

/// Leak Indexer CLI: a resumable, deduplicating indexer for credential
/// leak dumps.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lidx.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lidx",
    about = "Leak Indexer: a resumable, deduplicating indexer for credential leak dumps",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lidx.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the hosts, leaks, and
    /// credentials tables. Running it multiple times is safe.
    Init,

    /// Index the configured collection.
    ///
    /// Registers new leak files, then parses every file that is not yet
    /// done. Interrupted runs resume where they left off.
    Index {
        /// Override `source.root`.
        #[arg(long)]
        root: Option<PathBuf>,
        /// Override `source.collection`.
        #[arg(long)]
        collection: Option<String>,
        /// Override `pipeline.workers`.
        #[arg(long)]
        workers: Option<usize>,
        /// Override `pipeline.batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,
        /// Progress output: `auto`, `human`, `json`, or `off`.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Show database statistics.
    Stats,

    /// Delete all leak files, hosts, and credentials.
    Reset {
        /// Confirm the reset.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index {
            root,
            collection,
            workers,
            batch_size,
            progress,
        } => {
            let cfg = cfg.with_overrides(Overrides {
                root,
                collection,
                workers,
                batch_size,
            })?;
            let reporter = ProgressMode::from_flag(&progress)?.reporter();

            let cancel = CancellationToken::new();
            tokio::spawn({
                let cancel = cancel.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("interrupt received, stopping");
                        cancel.cancel();
                    }
                }
            });

            let summary = ingest::run_index(&cfg, reporter.as_ref(), cancel).await?;
            print_summary(&cfg.source.collection, &summary);
            if summary.outcome != RunOutcome::Completed {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Reset { yes } => {
            if !yes {
                anyhow::bail!("Refusing to reset without --yes.");
            }
            let pool = db::connect(&cfg).await?;
            migrate::migrate_pool(&pool).await?;
            let removed = migrate::reset_database(&pool).await?;
            pool.close().await;
            println!("Reset complete: {} leak files removed.", removed);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_summary(collection: &str, summary: &RunSummary) {
    let e = &summary.enumeration;
    println!("index {}", collection);
    println!("  run id: {}", summary.run_id);
    println!(
        "  discovered files: {} ({} new, {} resumed, {} already done, {} skipped)",
        format_number(e.discovered),
        format_number(e.new),
        format_number(e.resumed),
        format_number(e.already_done),
        format_number(e.skipped)
    );
    println!("  jobs: {}", format_number(summary.sent));
    println!("  completed: {}", format_number(summary.completed));
    println!("  failed: {}", format_number(summary.failed));
    println!(
        "  credentials inserted: {}",
        format_number(summary.totals.inserted)
    );
    println!("  duplicates: {}", format_number(summary.totals.duplicates));
    println!("  lines skipped: {}", format_number(summary.totals.skipped));
    println!("  elapsed: {:.1}s", summary.elapsed.as_secs_f64());
    println!("{}", summary.outcome);
}
