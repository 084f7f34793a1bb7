//! Creator Archiver - supervised batch fetching of creator content feeds.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use creator_archiver::compat::{self, CompatChecker};
use creator_archiver::config::ConfigLoader;
use creator_archiver::display;
use creator_archiver::fetch::{FetchSupervisor, FETCH_BIN};
use creator_archiver::orchestrator::Orchestrator;

#[derive(Parser)]
#[command(
    name = "creator-archiver",
    about = "Supervised batch archiver for creator content feeds",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to the config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and post-process every configured creator.
    Run {
        /// Print the fetch commands without launching anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Check which flags the installed fetch tool supports.
    Check,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Option<creator_archiver::config::ArchiverConfig> {
    let loader = match path {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    match loader.load() {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            None
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { dry_run } => {
            let Some(config) = load_config(cli.config) else {
                return;
            };
            if config.creators.is_empty() {
                tracing::warn!("no creators configured, nothing to do");
                return;
            }
            tracing::info!(creators = config.creators.len(), "configuration loaded");

            if dry_run {
                let supervisor = FetchSupervisor::new(
                    config.clone(),
                    creator_archiver::fetch::FetchLauncher::new(),
                );
                for job in &config.creators {
                    match supervisor.command_for(job) {
                        Ok(builder) => println!("{}", builder.command_line(FETCH_BIN)),
                        Err(e) => {
                            tracing::error!(creator = %job.name, error = %e, "invalid target URL");
                        }
                    }
                }
                return;
            }

            let orchestrator = Orchestrator::new(config);
            let summary = orchestrator.run().await;
            display::print_run_summary(&summary);
        }
        Commands::Check => {
            let Some(config) = load_config(cli.config) else {
                return;
            };
            let checker = CompatChecker::new();
            let report = checker.check().await;

            let path = config.downloads_dir.join("ytdlp_compatibility.json");
            if let Err(e) = compat::write_report(&report, &path).await {
                tracing::error!(path = %path.display(), error = %e, "failed to write report");
            }

            let recommended = compat::recommended_args(&report, &config.base_url);
            tracing::info!(
                "recommended options: {} {}",
                FETCH_BIN,
                recommended.join(" ")
            );
        }
    }
}
