//! # Draw Ledger CLI (`ledger`)
//!
//! Database setup, one-shot queries and loads, ticket checks, and the HTTP
//! server.
//!
//! ## Usage
//!
//! ```bash
//! ledger --config ./config/ledger.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ledger init` | Create the SQLite database and schema |
//! | `ledger serve` | Start the HTTP server |
//! | `ledger query` | Range query, printed as JSON |
//! | `ledger load` | Foreground bulk backfill |
//! | `ledger check <round> <numbers>` | Evaluate a ticket |
//! | `ledger latest` | Print the resolved latest round |
//!
//! Log verbosity follows `RUST_LOG` (default `draw_ledger=info,tower_http=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use draw_ledger::service::{LoadRequest, RangeQuery};
use draw_ledger::{commands, config, migrate, server};

/// Draw Ledger CLI: a local, gap-free ledger of lottery draws.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ledger.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ledger",
    about = "Draw Ledger: a local, gap-free ledger of lottery draws",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ledger.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `draws` table.
    /// Running it again is harmless.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Query a range of rounds, fetching missing ones.
    Query {
        #[arg(long)]
        start: Option<u32>,
        #[arg(long)]
        end: Option<u32>,
        /// Most recent N rounds; overrides --start/--end.
        #[arg(long)]
        latest: Option<u32>,
        /// Answer from the database only, never contact the provider.
        #[arg(long)]
        store_only: bool,
        /// Lift the span limit.
        #[arg(long)]
        no_limit: bool,
    },

    /// Backfill a range in paced batches and print the report.
    ///
    /// Defaults to the most recent `[query].default_load_span` rounds.
    Load {
        #[arg(long)]
        start: Option<u32>,
        #[arg(long)]
        end: Option<u32>,
        /// Rounds per batch.
        #[arg(long)]
        batch: Option<usize>,
        /// Pause between batches, in milliseconds.
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Check a ticket against a round.
    Check {
        round: u32,
        /// Six comma-separated numbers, e.g. `8,12,19,23,31,40`.
        numbers: String,
    },

    /// Print the latest round and how it was determined.
    Latest,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("draw_ledger=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Query {
            start,
            end,
            latest,
            store_only,
            no_limit,
        } => {
            let query = RangeQuery {
                start,
                end,
                latest,
                store_only,
                no_limit,
            };
            commands::run_query(&cfg, query).await?;
        }
        Commands::Load {
            start,
            end,
            batch,
            delay_ms,
        } => {
            let request = LoadRequest {
                start,
                end,
                batch_size: batch,
                delay_ms,
            };
            commands::run_load(&cfg, request).await?;
        }
        Commands::Check { round, numbers } => {
            commands::run_check(&cfg, round, &numbers).await?;
        }
        Commands::Latest => {
            commands::run_latest(&cfg).await?;
        }
    }

    Ok(())
}
