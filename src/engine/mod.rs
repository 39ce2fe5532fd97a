//! Execution engine module
//!
//! Stream graph and scheduler.
//!
//! # Overview
//!
//! The engine module provides:
//! - `StreamGraph` - validated DAG of stream definitions, split into levels
//! - `SyncEngine` - runs levels in order, fanning child streams out over the
//!   materialized records of their parents on a bounded worker pool
//! - `SyncStats` / `SyncReport` - what a run did
//!
//! A terminal failure in any instance cancels the run: in-flight instances
//! finish their current page, nothing new starts, and the bookmark document
//! is flushed before the error is returned.

mod graph;
mod types;

pub use graph::StreamGraph;
pub use types::{SyncReport, SyncStats};

use crate::error::{Error, Result};
use crate::partition::{ListRouter, ParentRouter, PartitionRouter, PartitionValue};
use crate::stream::{
    checkpoint, run_instance, InstanceOutcome, RunOptions, StreamDefinition, StreamInstance,
    StreamStatus, SyncContext,
};
use crate::template;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Instances planned for one stream
#[derive(Debug, Default)]
struct PlannedInstances {
    runnable: Vec<StreamInstance>,
    skipped: Vec<StreamInstance>,
}

/// Sync engine for orchestrating data extraction
pub struct SyncEngine {
    /// Stream graph
    graph: Arc<StreamGraph>,
    /// Shared collaborators
    ctx: SyncContext,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(graph: StreamGraph, ctx: SyncContext) -> Self {
        Self {
            graph: Arc::new(graph),
            ctx,
        }
    }

    /// Get the stream graph
    pub fn graph(&self) -> &StreamGraph {
        &self.graph
    }

    /// Get the sync context
    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    /// Run every selected stream and its ancestors
    pub async fn run(&self) -> Result<SyncReport> {
        let start = Instant::now();
        let plan = self.graph.plan(&self.ctx.selection);
        info!(streams = plan.len(), "Starting sync");

        self.emit_schemas(&plan)?;

        let mut report = SyncReport::default();
        let mut materialized: HashMap<String, Vec<Value>> = HashMap::new();
        let mut skipped_partitions: HashMap<String, Vec<PartitionValue>> = HashMap::new();
        let semaphore = Arc::new(Semaphore::new(self.ctx.settings.max_workers.max(1)));
        let mut failure: Option<Error> = None;

        for level in self.graph.levels() {
            let mut tasks = JoinSet::new();

            for name in level.iter().filter(|n| plan.contains(*n)) {
                let Some(def) = self.graph.get(name) else {
                    continue;
                };
                if self.ctx.cancel.is_cancelled() {
                    failure.get_or_insert(Error::Cancelled);
                    break;
                }

                let planned = match self.plan_instances(def, &materialized, &skipped_partitions) {
                    Ok(planned) => planned,
                    Err(e) => {
                        error!(stream = %name, error = %e, "Failed to plan stream instances");
                        self.ctx.cancel.cancel();
                        failure.get_or_insert(e);
                        break;
                    }
                };

                for instance in planned.skipped {
                    let outcome = InstanceOutcome::skipped(&instance);
                    report.stats.add_outcome(&outcome);
                    report.outcomes.push(outcome);
                    if let Some(partition) = instance.partition {
                        skipped_partitions
                            .entry(name.clone())
                            .or_default()
                            .push(partition);
                    }
                }

                let options = RunOptions {
                    emit: self.ctx.selection.is_selected(name),
                    materialize: self
                        .graph
                        .children(name)
                        .iter()
                        .any(|child| plan.contains(*child)),
                };
                debug!(
                    stream = %name,
                    instances = planned.runnable.len(),
                    emit = options.emit,
                    materialize = options.materialize,
                    "Scheduling stream"
                );

                for instance in planned.runnable {
                    let def = Arc::clone(def);
                    let ctx = self.ctx.clone();
                    let semaphore = Arc::clone(&semaphore);
                    tasks.spawn(async move {
                        let result = async {
                            let _permit = semaphore
                                .acquire_owned()
                                .await
                                .map_err(|_| Error::Other("worker pool closed".to_string()))?;
                            if ctx.cancel.is_cancelled() {
                                return Err(Error::Cancelled);
                            }
                            run_instance(&def, &instance, &ctx, options).await
                        }
                        .await;
                        (instance, result)
                    });
                }
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((instance, Ok(mut outcome))) => {
                        report.stats.add_outcome(&outcome);
                        match outcome.status {
                            StreamStatus::Completed => {
                                let records = std::mem::take(&mut outcome.materialized);
                                if !records.is_empty() {
                                    materialized
                                        .entry(outcome.stream.clone())
                                        .or_default()
                                        .extend(records);
                                }
                            }
                            StreamStatus::Skipped => {
                                if let Some(partition) = instance.partition {
                                    skipped_partitions
                                        .entry(outcome.stream.clone())
                                        .or_default()
                                        .push(partition);
                                }
                            }
                            _ => {}
                        }
                        report.outcomes.push(outcome);
                    }
                    Ok((instance, Err(e))) => {
                        report.outcomes.push(InstanceOutcome::failed(&instance));
                        report.stats.add_failure();
                        if matches!(e, Error::Cancelled) && failure.is_some() {
                            debug!(key = %instance.key, "Instance cancelled");
                        } else if failure.is_none() {
                            error!(
                                stream = %instance.stream,
                                key = %instance.key,
                                error = %e,
                                "Aborting run"
                            );
                            self.ctx.cancel.cancel();
                            failure = Some(e);
                        } else {
                            warn!(key = %instance.key, error = %e, "Additional failure after abort");
                        }
                    }
                    Err(join_error) => {
                        self.ctx.cancel.cancel();
                        failure.get_or_insert(Error::Other(format!(
                            "stream task panicked: {join_error}"
                        )));
                    }
                }
            }

            if failure.is_some() {
                break;
            }
        }

        report
            .stats
            .set_duration(start.elapsed().as_millis() as u64);

        // Flush whatever progress was earned, even on failure
        let flushed = checkpoint(&self.ctx.bookmarks, self.ctx.emitter.as_ref()).await;
        match failure {
            Some(e) => {
                if let Err(flush_error) = flushed {
                    error!(error = %flush_error, "Final checkpoint failed");
                }
                Err(e)
            }
            None => {
                flushed?;
                info!(
                    records = report.stats.records_synced,
                    pages = report.stats.pages_fetched,
                    completed = report.stats.instances_completed,
                    skipped = report.stats.instances_skipped,
                    duration_ms = report.stats.duration_ms,
                    "Sync completed"
                );
                Ok(report)
            }
        }
    }

    /// Emit a schema message for every selected stream in the plan
    fn emit_schemas(&self, plan: &BTreeSet<String>) -> Result<()> {
        for def in self.graph.definitions() {
            if plan.contains(&def.name) && self.ctx.selection.is_selected(&def.name) {
                self.ctx.emitter.emit_schema(
                    &def.name,
                    &def.schema,
                    &def.key_properties,
                    def.cursor_field(),
                )?;
            }
        }
        Ok(())
    }

    /// Resolve the instances of one stream from configured ids or parent records
    fn plan_instances(
        &self,
        def: &StreamDefinition,
        materialized: &HashMap<String, Vec<Value>>,
        skipped_partitions: &HashMap<String, Vec<PartitionValue>>,
    ) -> Result<PlannedInstances> {
        let partitions: Vec<Option<PartitionValue>> = if def.is_top_level() {
            if def.partitions.is_empty() {
                if needs_partition(&def.path) {
                    debug!(stream = %def.name, "No partitions configured");
                    Vec::new()
                } else {
                    vec![None]
                }
            } else {
                ListRouter::new(def.partitions.clone(), "id")
                    .partitions()?
                    .into_iter()
                    .map(Some)
                    .collect()
            }
        } else {
            let records: Vec<Value> = def
                .parents
                .iter()
                .filter_map(|parent| materialized.get(parent))
                .flatten()
                .cloned()
                .collect();
            ParentRouter::new(records, def.parent_key.clone())
                .partitions()?
                .into_iter()
                .map(Some)
                .collect()
        };

        let mut planned = PlannedInstances::default();
        let mut seen = HashSet::new();
        for partition in partitions {
            let instance = StreamInstance::resolve(def, partition, &self.ctx)?;
            if seen.insert(instance.key.clone()) {
                planned.runnable.push(instance);
            } else {
                warn!(stream = %def.name, key = %instance.key, "Duplicate stream key, skipping");
            }
        }

        // Children of skipped parent instances are skipped without any request.
        // The skipped partition stands in for the parent record, so it goes
        // through the same parent key as materialized records do.
        for parent in &def.parents {
            let stand_ins: Vec<Value> = skipped_partitions
                .get(parent)
                .into_iter()
                .flatten()
                .map(PartitionValue::to_value)
                .collect();
            let child_partitions =
                ParentRouter::new(stand_ins, def.parent_key.clone()).partitions()?;
            for partition in child_partitions {
                match StreamInstance::resolve(def, Some(partition), &self.ctx) {
                    Ok(instance) if seen.insert(instance.key.clone()) => {
                        info!(
                            stream = %def.name,
                            key = %instance.key,
                            parent = %parent,
                            "Parent skipped, skipping instance"
                        );
                        planned.skipped.push(instance);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!(
                            stream = %def.name,
                            parent = %parent,
                            error = %e,
                            "Skipped parent has no child key"
                        );
                    }
                }
            }
        }

        Ok(planned)
    }
}

/// Whether a path template reads partition fields
fn needs_partition(path: &str) -> bool {
    template::extract_variables(path)
        .iter()
        .any(|var| var.starts_with("partition"))
}

#[cfg(test)]
mod tests;
