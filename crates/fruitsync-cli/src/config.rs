use clap::{Parser, Subcommand, ValueEnum};
use fruitsync_core::config::{FileConfig, SourceConfig};
use std::path::PathBuf;

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "fruitsync")]
#[command(
    author,
    version,
    about = "Synchronizes a PostgreSQL fruit catalog with the Fruityvice API"
)]
#[command(after_help = "Examples:
  fruitsync sync
  fruitsync logs --pending --format json
  fruitsync stats")]
pub struct Config {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Base URL of the fruit API (overrides the config file)
    #[arg(long, env = "FRUITSYNC_API_URL")]
    pub api_url: Option<String>,

    /// Custom path to the config.toml file
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Resolves the catalog source: CLI/env first, then the config file, then the default.
    pub fn source_config(&self, file: &FileConfig) -> SourceConfig {
        let mut source = file.source_config();
        if let Some(url) = &self.api_url {
            source.base_url = url.clone();
        }
        source
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Fetch the full catalog and reconcile it into the database
    Sync,
    /// Show recent run logs
    #[command(after_help = "Examples:
  fruitsync logs --limit 5
  fruitsync logs --pending --format json")]
    Logs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only show runs whose notification has not been sent yet
        #[arg(short, long)]
        pending: bool,
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
    /// Show row counts and the latest run
    Stats,
}

/// Supported output formats for `logs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// Pretty-printed JSON array
    Json,
}
