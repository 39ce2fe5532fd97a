//! Bookmark store implementation
//!
//! Provides the shared, internally synchronized bookmark map with
//! file-based persistence and atomic writes. Checkpoints are serialized:
//! snapshots are emitted and persisted in the order they were taken.

use super::types::{compare_progress, BookmarkDocument};
use crate::error::{Error, Result};
use serde_json::Value;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Shared bookmark map; clones share the same underlying document
#[derive(Debug)]
pub struct BookmarkStore {
    /// Path to the state file (`None` = in-memory)
    path: Option<PathBuf>,
    /// Current bookmarks
    doc: Arc<RwLock<BookmarkDocument>>,
    /// Held for the whole snapshot, emit and write of one checkpoint
    flush: Arc<Mutex<()>>,
}

impl BookmarkStore {
    /// Create an in-memory store (no file persistence)
    pub fn in_memory() -> Self {
        Self::from_document(BookmarkDocument::new())
    }

    /// Create an in-memory store seeded with a document
    pub fn from_document(doc: BookmarkDocument) -> Self {
        Self {
            path: None,
            doc: Arc::new(RwLock::new(doc)),
            flush: Arc::new(Mutex::new(())),
        }
    }

    /// Create an empty store persisted at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            doc: Arc::new(RwLock::new(BookmarkDocument::new())),
            flush: Arc::new(Mutex::new(())),
        }
    }

    /// Create a store from a file, loading existing bookmarks if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let doc = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            parse_document(&contents)?
        } else {
            BookmarkDocument::new()
        };

        Ok(Self {
            path: Some(path),
            doc: Arc::new(RwLock::new(doc)),
            flush: Arc::new(Mutex::new(())),
        })
    }

    /// Create an in-memory store from an inline JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::from_document(parse_document(json)?))
    }

    /// Get the progress value for a key
    pub async fn get(&self, key: &str) -> Option<String> {
        let doc = self.doc.read().await;
        doc.get(key).map(ToString::to_string)
    }

    /// Advance the bookmark for `key`.
    ///
    /// Returns `true` only when the stored value moved. An attempt to move a
    /// bookmark backwards is rejected with a warning.
    pub async fn set(&self, key: &str, value: &str) -> bool {
        let mut doc = self.doc.write().await;
        if let Some(current) = doc.get(key) {
            match compare_progress(value, current) {
                Ordering::Less => {
                    warn!(
                        key,
                        current,
                        rejected = value,
                        "Ignoring bookmark regression"
                    );
                    return false;
                }
                Ordering::Equal if value == current => return false,
                _ => {}
            }
        }
        doc.insert(key, value);
        debug!(key, value, "Bookmark advanced");
        true
    }

    /// One-time start-of-run reconciliation against the configured start date.
    ///
    /// Returns `max(start_date, stored)`. A stored value older than the start
    /// date is overwritten; this is the only path allowed to move a bookmark.
    pub async fn reconcile_start(&self, key: &str, start_date: Option<&str>) -> Option<String> {
        let mut doc = self.doc.write().await;
        let stored = doc.get(key).map(ToString::to_string);

        match (stored, start_date) {
            (Some(stored), Some(start)) => {
                if compare_progress(&stored, start) == Ordering::Less {
                    info!(key, stored = %stored, start, "Start date overrides stored bookmark");
                    doc.insert(key, start);
                    Some(start.to_string())
                } else {
                    Some(stored)
                }
            }
            (Some(stored), None) => Some(stored),
            (None, start) => start.map(ToString::to_string),
        }
    }

    /// Copy of the full document
    pub async fn snapshot(&self) -> BookmarkDocument {
        self.doc.read().await.clone()
    }

    /// Take a snapshot, hand it to `emit`, then write it to the state file.
    ///
    /// Concurrent checkpoints run one at a time, so the emitted and persisted
    /// snapshots never step backwards. In-memory stores only emit.
    pub async fn checkpoint<F>(&self, emit: F) -> Result<()>
    where
        F: FnOnce(&BookmarkDocument) -> Result<()> + Send,
    {
        let _guard = self.flush.lock().await;
        let doc = self.snapshot().await;
        emit(&doc)?;

        let Some(path) = &self.path else {
            return Ok(());
        };
        write_atomic(path, &doc).await.map_err(|e| Error::Checkpoint {
            message: e.to_string(),
        })
    }

    /// Get the state file path
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}

impl Clone for BookmarkStore {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            doc: Arc::clone(&self.doc),
            flush: Arc::clone(&self.flush),
        }
    }
}

fn parse_document(contents: &str) -> Result<BookmarkDocument> {
    if contents.trim().is_empty() {
        return Ok(BookmarkDocument::new());
    }
    let value: Value = serde_json::from_str(contents)
        .map_err(|e| Error::state(format!("Failed to parse state JSON: {e}")))?;
    Ok(BookmarkDocument::from_value(&value))
}

/// Write to a temp file first, then rename for atomicity
async fn write_atomic(path: &Path, doc: &BookmarkDocument) -> Result<()> {
    let contents = serde_json::to_string_pretty(doc)
        .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))?;

    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, &contents)
        .await
        .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;

    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;

    Ok(())
}
