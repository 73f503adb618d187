//! CLI argument definitions using clap derive

use crate::request::{Destination, Method};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// flipcache - offline asset cache manager
///
/// Classifies requests by route, serves them through cache strategies and
/// keeps versioned stores bounded.
#[derive(Parser, Debug)]
#[command(name = "flipcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "FLIPCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a URL through the cache layer
    Fetch(FetchArgs),

    /// Install the configured version and activate it
    Install(InstallArgs),

    /// Show the worker record and stores
    Status(StatusArgs),

    /// Show the route policy a URL resolves to
    Classify(ClassifyArgs),

    /// Inspect or clear stores
    Stores(StoresArgs),

    /// Report storage usage
    Usage,

    /// Prefetch model URLs into the model store
    Prefetch(PrefetchArgs),

    /// Send a raw protocol message (JSON argument or stdin)
    Message(MessageArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Absolute URL to fetch
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: Method,

    /// Destination hint (document, image, script, style, font, other)
    #[arg(short, long, default_value = "other")]
    pub destination: Destination,

    /// Simulate having no network
    #[arg(long)]
    pub offline: bool,

    /// Write the response body to a file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the install command
#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Reinstall even if this version is already active
    #[arg(short, long)]
    pub force: bool,

    /// Leave the new version waiting instead of activating it
    #[arg(long)]
    pub no_activate: bool,

    /// Install without network access (only an empty manifest succeeds)
    #[arg(long)]
    pub offline: bool,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the classify command
#[derive(Parser, Debug)]
pub struct ClassifyArgs {
    /// Absolute URL to classify
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: Method,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the stores command
#[derive(Parser, Debug)]
pub struct StoresArgs {
    #[command(subcommand)]
    pub action: StoresAction,
}

/// Stores subcommands
#[derive(Subcommand, Debug)]
pub enum StoresAction {
    /// List existing stores
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List keys in a store, oldest first
    Keys {
        /// Store name
        name: String,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete a store
    Clear {
        /// Store name
        name: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the prefetch command
#[derive(Parser, Debug)]
pub struct PrefetchArgs {
    /// Model URLs (defaults to [install].models)
    pub urls: Vec<String>,
}

/// Arguments for the message command
#[derive(Parser, Debug)]
pub struct MessageArgs {
    /// Message JSON, e.g. '{"type":"GET_CACHE_SIZE"}' (reads stdin if omitted)
    pub json: Option<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

impl OutputFormat {
    /// Whether stdout carries machine-readable output
    pub fn is_machine(&self) -> bool {
        !matches!(self, Self::Table)
    }
}
