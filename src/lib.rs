// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # GitLab Tap
//!
//! Incremental extraction of GitLab REST resources into a line-oriented
//! stream of schema, record and bookmark-state messages.
//!
//! ## Features
//!
//! - **Page-Driven Extraction**: follows GitLab's `X-Next-Page` header lazily
//! - **Bounded Retries**: exponential backoff for throttling and server errors
//! - **Incremental Sync**: per-partition bookmarks that only move forward
//! - **Stream Graph**: child streams fan out over their parents' records
//! - **Bounded Concurrency**: independent partitions run on a worker pool
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gitlab_tap::{catalog::Selection, config::TapConfig, gitlab, output::JsonLinesEmitter};
//! use gitlab_tap::state::BookmarkStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> gitlab_tap::Result<()> {
//!     let config = TapConfig::load("config.json")?;
//!     config.validate()?;
//!
//!     let engine = gitlab::sync_engine(
//!         &config,
//!         Arc::new(JsonLinesEmitter::stdout()),
//!         BookmarkStore::from_file("state.json")?,
//!         Selection::from_catalog(&gitlab::discover(&config, true)),
//!     )?;
//!     let report = engine.run().await?;
//!     eprintln!("{} records", report.stats.records_synced);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                SyncEngine (StreamGraph, worker pool)            │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │  Stream  │   HTTP    │   Paginate    │ Partition │   Output    │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Sync     │ GET       │ X-Next-Page   │ List      │ SCHEMA      │
//! │ Bookmark │ Retry     │ Single object │ Parent    │ RECORD      │
//! │ Shape    │ Rate Limit│               │           │ STATE       │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Tap configuration
pub mod config;

/// Template interpolation
pub mod template;

/// HTTP client with retry and rate limiting
pub mod http;

/// Pagination strategies
pub mod pagination;

/// Partition routing
pub mod partition;

/// Bookmark state and checkpointing
pub mod state;

/// Record schemas and shaping
pub mod schema;

/// Stream definitions and the per-instance sync algorithm
pub mod stream;

/// Stream graph and scheduler
pub mod engine;

/// Schema, record and state messages
pub mod output;

/// Discovery catalog and selection
pub mod catalog;

/// Built-in GitLab streams
pub mod gitlab;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use engine::{StreamGraph, SyncEngine, SyncReport, SyncStats};
pub use error::{Error, Result};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
