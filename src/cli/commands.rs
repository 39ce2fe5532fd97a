//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// GitLab extractor emitting schema, record and state messages on stdout
#[derive(Parser, Debug)]
#[command(name = "gitlab-tap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON or YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// State file (JSON); updated in place on every checkpoint
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Inline state JSON (not persisted)
    #[arg(long, global = true, conflicts_with = "state")]
    pub state_json: Option<String>,

    /// Catalog file selecting streams and fields
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Output format for `discover` and `streams`
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the catalog of available streams
    Discover,

    /// Extract selected streams
    Sync {
        /// Streams to sync (comma-separated); overrides the catalog selection
        #[arg(long)]
        streams: Option<String>,
    },

    /// List stream names and whether the configuration enables them
    Streams,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON on one line
    Json,
    /// Indented JSON
    Pretty,
}
