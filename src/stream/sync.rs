//! Per-instance sync algorithm
//!
//! One [`StreamInstance`] is a stream bound to one partition (or none, for
//! unpartitioned top-level streams). [`run_instance`] drives it from
//! `Running` to `Completed`, `Skipped` or an error:
//!
//! 1. reconcile the incremental lower bound against the configured start date
//! 2. render the request and apply the bound server- or client-side
//! 3. page through the resource, emitting shaped records in page order
//! 4. set the bookmark to the highest cursor observed and checkpoint
//!
//! Resource-missing responses end the instance as `Skipped`. Every other
//! error is returned to the scheduler, which aborts the run.

use super::definition::{IncrementalFilter, StreamDefinition};
use super::transform::apply_all;
use crate::catalog::Selection;
use crate::config::{EngineSettings, TapConfig};
use crate::error::Result;
use crate::http::{RetryPolicy, Transport};
use crate::output::Emitter;
use crate::pagination::{PageReader, PageRequest};
use crate::partition::PartitionValue;
use crate::schema::{apply_field_selection, normalize_date_time, Shaped};
use crate::state::{compare_progress, max_progress, BookmarkStore};
use crate::template::{self, TemplateContext};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// ============================================================================
// Types
// ============================================================================

/// Lifecycle of one stream instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Not started
    Pending,
    /// Fetching pages
    Running,
    /// Exhausted successfully
    Completed,
    /// Resource missing, or parent not completed
    Skipped,
    /// Terminal failure
    Failed,
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A stream bound to one partition
#[derive(Debug, Clone)]
pub struct StreamInstance {
    /// Stream name
    pub stream: String,
    /// Stream key (bookmark key)
    pub key: String,
    /// Partition this instance runs for
    pub partition: Option<PartitionValue>,
}

impl StreamInstance {
    /// Bind `definition` to `partition`, rendering its stream key
    pub fn resolve(
        definition: &StreamDefinition,
        partition: Option<PartitionValue>,
        ctx: &SyncContext,
    ) -> Result<Self> {
        let template_ctx = ctx.template_context(partition.as_ref());
        let key = template::render(&definition.key_template(), &template_ctx)?;
        Ok(Self {
            stream: definition.name.clone(),
            key,
            partition,
        })
    }
}

/// Result of running one instance
#[derive(Debug, Clone)]
pub struct InstanceOutcome {
    /// Stream name
    pub stream: String,
    /// Stream key
    pub key: String,
    /// Final status
    pub status: StreamStatus,
    /// Records emitted
    pub records: u64,
    /// Pages fetched
    pub pages: usize,
    /// Fields dropped by schema shaping
    pub fields_dropped: usize,
    /// Bookmark after the instance
    pub bookmark: Option<String>,
    /// Post-transform records kept for child streams
    pub materialized: Vec<Value>,
    /// Stopped at the page limit
    pub truncated: bool,
}

impl InstanceOutcome {
    fn new(instance: &StreamInstance, status: StreamStatus) -> Self {
        Self {
            stream: instance.stream.clone(),
            key: instance.key.clone(),
            status,
            records: 0,
            pages: 0,
            fields_dropped: 0,
            bookmark: None,
            materialized: Vec::new(),
            truncated: false,
        }
    }

    /// Outcome for an instance that never ran
    pub fn skipped(instance: &StreamInstance) -> Self {
        Self::new(instance, StreamStatus::Skipped)
    }

    /// Outcome for an instance that ended in an error
    pub fn failed(instance: &StreamInstance) -> Self {
        Self::new(instance, StreamStatus::Failed)
    }
}

/// What the scheduler wants from an instance
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Emit records (the stream is selected)
    pub emit: bool,
    /// Keep records for child streams
    pub materialize: bool,
}

/// Shared collaborators for every instance in a run
#[derive(Clone)]
pub struct SyncContext {
    /// HTTP transport
    pub transport: Arc<dyn Transport>,
    /// Retry policy applied to every call
    pub retry: RetryPolicy,
    /// Bookmark store
    pub bookmarks: BookmarkStore,
    /// Message sink
    pub emitter: Arc<dyn Emitter>,
    /// Engine tuning knobs
    pub settings: EngineSettings,
    /// API base URL, without trailing slash
    pub api_url: String,
    /// Configured start date
    pub start_date: Option<String>,
    /// Template view of the configuration
    pub config: Value,
    /// Selected streams and fields
    pub selection: Arc<Selection>,
    /// Run-wide cancellation
    pub cancel: CancellationToken,
}

impl SyncContext {
    /// Create a context with default settings
    pub fn new(
        transport: Arc<dyn Transport>,
        emitter: Arc<dyn Emitter>,
        bookmarks: BookmarkStore,
        api_url: impl Into<String>,
    ) -> Self {
        let settings = EngineSettings::default();
        Self {
            transport,
            retry: RetryPolicy::from_settings(&settings),
            bookmarks,
            emitter,
            settings,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            start_date: None,
            config: Value::Null,
            selection: Arc::new(Selection::all()),
            cancel: CancellationToken::new(),
        }
    }

    /// Create a context from the tap configuration
    pub fn from_tap_config(
        config: &TapConfig,
        transport: Arc<dyn Transport>,
        emitter: Arc<dyn Emitter>,
        bookmarks: BookmarkStore,
    ) -> Self {
        let mut ctx = Self::new(transport, emitter, bookmarks, config.api_url.clone())
            .with_settings(config.engine.clone());
        ctx.start_date.clone_from(&config.start_date);
        ctx.config = config.template_value();
        ctx
    }

    /// Set engine settings (and the retry policy derived from them)
    #[must_use]
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.retry = RetryPolicy::from_settings(&settings);
        self.settings = settings;
        self
    }

    /// Override the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the configured start date
    #[must_use]
    pub fn with_start_date(mut self, start_date: impl Into<String>) -> Self {
        self.start_date = Some(start_date.into());
        self
    }

    /// Set the selection
    #[must_use]
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Arc::new(selection);
        self
    }

    /// Observe an external cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Template context for one partition
    pub fn template_context(&self, partition: Option<&PartitionValue>) -> TemplateContext {
        let mut ctx = TemplateContext::with_config(self.config.clone());
        if let Some(partition) = partition {
            ctx.set_partition(partition.to_value());
        }
        ctx
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("api_url", &self.api_url)
            .field("start_date", &self.start_date)
            .field("settings", &self.settings)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Checkpoint
// ============================================================================

/// Emit the full bookmark document and persist it
pub async fn checkpoint(bookmarks: &BookmarkStore, emitter: &dyn Emitter) -> Result<()> {
    bookmarks
        .checkpoint(|snapshot| emitter.emit_bookmark_snapshot(snapshot))
        .await
}

// ============================================================================
// Sync Algorithm
// ============================================================================

/// Run one stream instance to completion
pub async fn run_instance(
    definition: &StreamDefinition,
    instance: &StreamInstance,
    ctx: &SyncContext,
    options: RunOptions,
) -> Result<InstanceOutcome> {
    let start = Instant::now();
    let stream = definition.name.as_str();
    let key = instance.key.as_str();
    let mut outcome = InstanceOutcome::new(instance, StreamStatus::Running);

    info!(stream, key, "Starting stream instance");

    // 1. Effective lower bound
    let lower_bound = match &definition.incremental {
        Some(_) => {
            ctx.bookmarks
                .reconcile_start(key, ctx.start_date.as_deref())
                .await
        }
        None => None,
    };

    // 2. Initial request descriptor
    let template_ctx = ctx.template_context(instance.partition.as_ref());
    let path = template::render_path(&definition.path, &template_ctx)?;
    let mut request = PageRequest::new(format!("{}{path}", ctx.api_url));
    for (name, value) in &definition.query {
        request = request.query(name.clone(), template::render(value, &template_ctx)?);
    }

    let mut client_side_bound = None;
    let mut stop_when_older = false;
    if let (Some(incremental), Some(bound)) = (&definition.incremental, &lower_bound) {
        match &incremental.filter {
            IncrementalFilter::ServerSide { param } => {
                request = request.query(param.clone(), bound.clone());
            }
            IncrementalFilter::ClientSide {
                stop_when_older: stop,
            } => {
                client_side_bound = Some(bound.as_str());
                stop_when_older = *stop;
            }
        }
    }

    // 3. Page through the resource
    let mut reader = PageReader::new(
        Arc::clone(&ctx.transport),
        ctx.retry.clone(),
        definition.pagination.build(ctx.settings.page_size),
        request,
    )
    .with_format(definition.format.clone())
    .with_max_pages(ctx.settings.max_pages)
    .with_cancellation(ctx.cancel.clone());

    let cursor_field = definition.cursor_field();
    let deselected = ctx.selection.deselected_fields(stream);
    let sorted = definition.incremental.as_ref().is_some_and(|i| i.sorted);
    let interval = ctx.settings.checkpoint_interval_pages.max(1);
    let mut max_cursor: Option<String> = None;

    loop {
        let page = match reader.next_page().await {
            Ok(Some(page)) => page,
            Ok(None) => break,
            Err(e) if e.is_resource_missing() => {
                warn!(stream, key, error = %e, "Resource not accessible, skipping instance");
                outcome.status = StreamStatus::Skipped;
                outcome.pages = reader.pages_fetched();
                outcome.materialized.clear();
                return Ok(outcome);
            }
            Err(e) => {
                error!(stream, key, error = %e, "Stream instance failed");
                return Err(e);
            }
        };

        let mut last_cursor: Option<String> = None;
        for value in page.records {
            let Value::Object(mut record) = value else {
                debug!(stream, key, "Skipping non-object record");
                continue;
            };
            apply_all(&definition.transforms, &mut record, instance.partition.as_ref());

            let cursor = cursor_field
                .and_then(|field| record.get(field))
                .and_then(Value::as_str)
                .map(|raw| normalize_date_time(raw).unwrap_or_else(|| raw.to_string()));
            if let Some(cursor) = &cursor {
                last_cursor = Some(cursor.clone());
                if let Some(bound) = client_side_bound {
                    if compare_progress(cursor, bound) == Ordering::Less {
                        continue;
                    }
                }
                max_cursor = Some(match max_cursor.take() {
                    Some(current) => max_progress(&current, cursor).to_string(),
                    None => cursor.clone(),
                });
            }

            if options.materialize {
                outcome.materialized.push(Value::Object(record.clone()));
            }
            if options.emit {
                let Shaped {
                    record: mut shaped,
                    dropped,
                } = definition.schema.shape(&record);
                outcome.fields_dropped += dropped.len();
                apply_field_selection(&mut shaped, deselected, &definition.key_properties);
                ctx.emitter.emit_record(stream, key, shaped)?;
                outcome.records += 1;
            }
        }

        // Descending endpoints: everything after an old page is older still
        if stop_when_older && page.has_more {
            if let (Some(last), Some(bound)) = (&last_cursor, client_side_bound) {
                if compare_progress(last, bound) == Ordering::Less {
                    debug!(stream, key, page = page.number, "Reached records older than bookmark");
                    break;
                }
            }
        }

        // Mid-instance checkpoints only for sorted streams whose bookmark moved
        if page.has_more && page.number % interval == 0 && sorted && options.emit {
            if let Some(cursor) = &max_cursor {
                if ctx.bookmarks.set(key, cursor).await {
                    checkpoint(&ctx.bookmarks, ctx.emitter.as_ref()).await?;
                }
            }
        }
    }

    outcome.pages = reader.pages_fetched();
    outcome.truncated = reader.is_truncated();

    // 4. Advance the bookmark to the highest cursor seen
    if options.emit {
        if let Some(cursor) = &max_cursor {
            if outcome.truncated && !sorted {
                warn!(
                    stream,
                    key, "Page limit reached on unsorted stream, bookmark not advanced"
                );
            } else {
                ctx.bookmarks.set(key, cursor).await;
            }
        }
    }
    outcome.bookmark = if definition.incremental.is_some() {
        ctx.bookmarks.get(key).await
    } else {
        None
    };
    outcome.status = StreamStatus::Completed;
    checkpoint(&ctx.bookmarks, ctx.emitter.as_ref()).await?;

    info!(
        stream,
        key,
        records = outcome.records,
        pages = outcome.pages,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Completed stream instance"
    );
    Ok(outcome)
}
