//! Built-in GitLab streams
//!
//! Provides:
//! - `definitions` - every GitLab stream, wired to the configured groups and projects
//! - `is_enabled` - license and opt-in gating used by discovery
//! - `schemas` - record schemas for each stream
//! - `sync_engine` - a ready-to-run engine over the real HTTP client

pub mod schemas;
mod streams;

pub use streams::{definitions, is_enabled, STREAM_NAMES};

use crate::catalog::{self, Catalog, Selection};
use crate::config::TapConfig;
use crate::engine::{StreamGraph, SyncEngine};
use crate::error::Result;
use crate::http::{HttpClient, Transport};
use crate::output::Emitter;
use crate::state::BookmarkStore;
use crate::stream::SyncContext;
use std::sync::Arc;

/// Build the validated stream graph for a configuration
pub fn stream_graph(config: &TapConfig) -> Result<StreamGraph> {
    StreamGraph::new(definitions(config))
}

/// Discover the catalog, marking gated streams unsupported
pub fn discover(config: &TapConfig, select_all: bool) -> Catalog {
    catalog::discover(
        &definitions(config),
        |name| is_enabled(name, config),
        select_all,
    )
}

/// Wire the configured HTTP client, graph and collaborators into an engine
pub fn sync_engine(
    config: &TapConfig,
    emitter: Arc<dyn Emitter>,
    bookmarks: BookmarkStore,
    selection: Selection,
) -> Result<SyncEngine> {
    let transport: Arc<dyn Transport> = Arc::new(HttpClient::from_tap_config(config)?);
    let ctx = SyncContext::from_tap_config(config, transport, emitter, bookmarks)
        .with_selection(selection);
    Ok(SyncEngine::new(stream_graph(config)?, ctx))
}
