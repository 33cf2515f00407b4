//! # Crawl Ledger CLI (`crawl-ledger`)
//!
//! Catalog crawl segments, plan parse and combine jobs, and submit them to a
//! batch runner.
//!
//! ## Usage
//!
//! ```bash
//! crawl-ledger --config ./config/crawl-ledger.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `crawl-ledger init` | Create the SQLite database and run schema migrations |
//! | `crawl-ledger discover <release>` | Catalog the segments of a release |
//! | `crawl-ledger status` | Segment counts per release and recent jobs |
//! | `crawl-ledger plan parse <release>` | Plan a parse job over unprocessed segments |
//! | `crawl-ledger plan combine <job>...` | Plan a combine job over parse jobs |
//! | `crawl-ledger submit <job>` | Launch a planned job |
//! | `crawl-ledger reset <release>` | Mark every segment of a release unprocessed |
//! | `crawl-ledger show <job>` | Print a job, its cluster and its steps |

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crawl_ledger::{commands, config, logging};

/// Crawl Ledger CLI: segment catalog and job planner for crawl processing.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/crawl-ledger.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "crawl-ledger",
    about = "Crawl Ledger: segment catalog and job planner for crawl processing",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/crawl-ledger.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it again is safe.
    Init,

    /// Catalog the segments of a crawl release.
    ///
    /// Segments already known are left untouched, including whether they
    /// were processed.
    Discover { release: String },

    /// Show segment counts per release and the job history.
    Status {
        /// Show every job instead of the most recent ten.
        #[arg(long)]
        all: bool,
    },

    /// Plan a job.
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },

    /// Submit a planned job to the configured runner.
    Submit { job: String },

    /// Mark every segment of a release unprocessed.
    Reset { release: String },

    /// Print a job with its steps and cluster.
    Show { job: String },
}

#[derive(Subcommand)]
enum PlanAction {
    /// Plan a parse job over segments of a release.
    Parse {
        release: String,

        /// Number of unprocessed segments to include (at most 256).
        #[arg(long)]
        max_segments: Option<usize>,

        /// Files to parse per segment; all files when omitted.
        #[arg(long)]
        max_files: Option<u32>,

        /// Parse exactly these segments instead (comma-separated names, at most 256).
        #[arg(long, value_delimiter = ',')]
        segments: Option<Vec<String>>,
    },

    /// Plan a combine job over the output of parse jobs.
    Combine {
        #[arg(required = true)]
        jobs: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            commands::run_init(&cfg).await?;
        }
        Commands::Discover { release } => {
            commands::run_discover(&cfg, &release).await?;
        }
        Commands::Status { all } => {
            commands::run_status(&cfg, all).await?;
        }
        Commands::Plan { action } => match action {
            PlanAction::Parse {
                release,
                max_segments,
                max_files,
                segments,
            } => {
                commands::run_plan_parse(&cfg, &release, max_segments, max_files, segments)
                    .await?;
            }
            PlanAction::Combine { jobs } => {
                commands::run_plan_combine(&cfg, &jobs).await?;
            }
        },
        Commands::Submit { job } => {
            commands::run_submit(&cfg, &job).await?;
        }
        Commands::Reset { release } => {
            commands::run_reset(&cfg, &release).await?;
        }
        Commands::Show { job } => {
            commands::run_show(&cfg, &job).await?;
        }
    }

    Ok(())
}
