//! flipcache - offline asset cache manager
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use flipcache::cli::commands;
use flipcache::cli::{Cli, Commands};
use flipcache::config::{Config, ConfigManager};
use flipcache::error::CacheResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);

    match cli.command {
        Commands::Fetch(args) => commands::fetch(args, &config).await,
        Commands::Install(args) => commands::install(args, &config).await,
        Commands::Status(args) => commands::status(args, &config).await,
        Commands::Classify(args) => commands::classify(args, &config).await,
        Commands::Stores(args) => commands::stores(args, &config).await,
        Commands::Usage => commands::usage(&config).await,
        Commands::Prefetch(args) => commands::prefetch(args, &config).await,
        Commands::Message(args) => commands::message(args, &config).await,
        Commands::Config(args) => commands::config(args, &config, &config_manager).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; `RUST_LOG` wins when set
fn init_logging(verbose: u8, config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("flipcache=warn"),
        1 => EnvFilter::new("flipcache=info"),
        _ => EnvFilter::new("flipcache=debug"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
