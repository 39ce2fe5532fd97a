//! State management module
//!
//! Handles bookmark tracking, checkpointing, and resumability.
//! Bookmarks are persisted between runs to enable incremental syncs.
//!
//! # Overview
//!
//! The state module provides:
//! - `BookmarkDocument` - Stream key to ISO-8601 progress value
//! - `BookmarkStore` - Shared, monotonic bookmark map with file persistence
//! - Chronological comparison of progress values

mod manager;
mod types;

pub use manager::BookmarkStore;
pub use types::{compare_progress, max_progress, parse_timestamp, BookmarkDocument};
