//! CLI module
//!
//! Command-line interface for the GitLab tap.
//!
//! # Commands
//!
//! - `discover` - Print the stream catalog
//! - `sync` - Extract data from the selected streams
//! - `streams` - List stream names (lightweight)

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
