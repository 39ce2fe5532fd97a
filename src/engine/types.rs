//! Engine types
//!
//! Run statistics and the per-run report.

use crate::stream::{InstanceOutcome, StreamStatus};

/// Statistics from a sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Total records emitted
    pub records_synced: u64,
    /// Total pages fetched
    pub pages_fetched: usize,
    /// Fields dropped by schema shaping
    pub fields_dropped: usize,
    /// Instances that completed
    pub instances_completed: usize,
    /// Instances skipped (resource missing or parent skipped)
    pub instances_skipped: usize,
    /// Instances that failed
    pub instances_failed: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one finished instance
    pub fn add_outcome(&mut self, outcome: &InstanceOutcome) {
        self.records_synced += outcome.records;
        self.pages_fetched += outcome.pages;
        self.fields_dropped += outcome.fields_dropped;
        match outcome.status {
            StreamStatus::Completed => self.instances_completed += 1,
            StreamStatus::Skipped => self.instances_skipped += 1,
            StreamStatus::Failed => self.instances_failed += 1,
            StreamStatus::Pending | StreamStatus::Running => {}
        }
    }

    /// Add a failure
    pub fn add_failure(&mut self) {
        self.instances_failed += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Aggregate statistics
    pub stats: SyncStats,
    /// Per-instance outcomes in completion order (records not retained)
    pub outcomes: Vec<InstanceOutcome>,
}

impl SyncReport {
    /// Outcome for a stream key
    pub fn outcome(&self, key: &str) -> Option<&InstanceOutcome> {
        self.outcomes.iter().find(|o| o.key == key)
    }

    /// Status for a stream key
    pub fn status(&self, key: &str) -> Option<StreamStatus> {
        self.outcome(key).map(|o| o.status)
    }

    /// Outcomes of one stream
    pub fn outcomes_for(&self, stream: &str) -> impl Iterator<Item = &InstanceOutcome> {
        let stream = stream.to_string();
        self.outcomes.iter().filter(move |o| o.stream == stream)
    }
}
