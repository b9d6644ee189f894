//! curateur CLI
//!
//! Thin front door for the scraping engine: argument parsing, logger
//! setup, config loading, Ctrl-C wiring, and exit codes. Everything else
//! lives in the library crates.

mod prompts;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use curateur_lib::{NonInteractive, Orchestrator, PromptHandler, RunConfig};

use crate::prompts::ConsolePrompts;

#[derive(Parser)]
#[command(name = "curateur")]
#[command(about = "Scrape ROM metadata and media into frontend catalogs", long_about = None)]
struct Cli {
    /// Path to the configuration file (default: ~/.config/curateur/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Platforms to process (e.g., nes,psx). Overrides the config allowlist.
    #[arg(short, long, value_delimiter = ',')]
    platforms: Option<Vec<String>>,

    /// Scan, evaluate, and look up — but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Answer every prompt with its safe default
    #[arg(long)]
    non_interactive: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("curateur")
        .join("config.toml")
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp_secs()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let mut config = match RunConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load {}: {e}", config_path.display());
            return ExitCode::from(1);
        }
    };

    if let Some(platforms) = cli.platforms {
        config.platforms.selection = platforms;
    }
    if cli.dry_run {
        config.runtime.dry_run = true;
    }

    let handler: Arc<dyn PromptHandler> = if cli.non_interactive || !ConsolePrompts::is_tty() {
        Arc::new(NonInteractive)
    } else {
        Arc::new(ConsolePrompts)
    };

    let orchestrator = match Orchestrator::new(config, handler) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::from(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start runtime: {e}");
            return ExitCode::from(1);
        }
    };

    runtime.block_on(async {
        let cancel = orchestrator.cancel_flag();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Cancellation requested; finishing in-flight work");
                cancel.cancel();
            }
        });

        match orchestrator.run().await {
            Ok(summary) => {
                if let Some(error) = summary.fatal {
                    log::error!("Run aborted: {error}");
                    ExitCode::from(1)
                } else if summary.cancelled {
                    log::warn!("Run cancelled; partial summaries written");
                    ExitCode::from(2)
                } else {
                    ExitCode::SUCCESS
                }
            }
            Err(e) => {
                log::error!("{e}");
                ExitCode::from(1)
            }
        }
    })
}
