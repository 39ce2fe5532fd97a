//! Emitters: where messages go
//!
//! Both implementations are safe to share between concurrently running
//! stream instances. Records from different instances may interleave; each
//! record message carries its stream name (and, in memory, its stream key).

use super::messages::Message;
use crate::error::{Error, Result};
use crate::schema::RecordSchema;
use crate::state::BookmarkDocument;
use crate::types::JsonObject;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

/// Sink for schemas, records and bookmark snapshots
pub trait Emitter: Send + Sync {
    /// Write one message
    fn emit(&self, message: Message) -> Result<()>;

    /// Write a stream schema
    fn emit_schema(
        &self,
        stream: &str,
        schema: &RecordSchema,
        key_properties: &[String],
        bookmark_property: Option<&str>,
    ) -> Result<()> {
        self.emit(Message::schema(
            stream,
            schema,
            key_properties,
            bookmark_property,
        ))
    }

    /// Write one record for a stream instance
    fn emit_record(&self, stream: &str, key: &str, record: JsonObject) -> Result<()> {
        self.emit(Message::record(stream, key, record))
    }

    /// Write a full bookmark snapshot
    fn emit_bookmark_snapshot(&self, document: &BookmarkDocument) -> Result<()> {
        self.emit(Message::state(document.to_value()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| Error::output("emitter lock poisoned"))
}

// ============================================================================
// JSON Lines Emitter
// ============================================================================

/// Writes one JSON message per line
pub struct JsonLinesEmitter<W: Write + Send> {
    writer: Mutex<W>,
}

impl JsonLinesEmitter<std::io::Stdout> {
    /// Emitter writing to standard output
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesEmitter<W> {
    /// Create an emitter over any writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|_| Error::output("emitter lock poisoned"))
    }
}

impl<W: Write + Send> Emitter for JsonLinesEmitter<W> {
    fn emit(&self, message: Message) -> Result<()> {
        let line = message.to_line()?;
        let mut writer = lock(&self.writer)?;
        writeln!(writer, "{line}")?;
        // A state line promises every earlier record was delivered
        if message.is_state() {
            writer.flush()?;
        }
        Ok(())
    }
}

// ============================================================================
// Memory Emitter
// ============================================================================

/// Collects messages in memory
#[derive(Debug, Default)]
pub struct MemoryEmitter {
    messages: Mutex<Vec<Message>>,
}

impl MemoryEmitter {
    /// Create an empty emitter
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages in emission order
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.messages).map(|m| m.clone()).unwrap_or_default()
    }

    /// Records emitted for a stream, in emission order
    pub fn records(&self, stream: &str) -> Vec<JsonObject> {
        self.records_where(|s, _| s == stream)
    }

    /// Records emitted by one stream instance, in emission order
    pub fn records_for_key(&self, key: &str) -> Vec<JsonObject> {
        self.records_where(|_, k| k == key)
    }

    fn records_where(&self, pred: impl Fn(&str, &str) -> bool) -> Vec<JsonObject> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Message::Record {
                    stream,
                    key,
                    record,
                    ..
                } if pred(&stream, &key) => Some(record),
                _ => None,
            })
            .collect()
    }

    /// Bookmark snapshots in emission order
    pub fn states(&self) -> Vec<serde_json::Value> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Message::State { value } => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Most recent bookmark snapshot
    pub fn last_state(&self) -> Option<serde_json::Value> {
        self.states().pop()
    }

    /// Names of streams a schema was emitted for
    pub fn schema_streams(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Message::Schema { stream, .. } => Some(stream),
                _ => None,
            })
            .collect()
    }
}

impl Emitter for MemoryEmitter {
    fn emit(&self, message: Message) -> Result<()> {
        lock(&self.messages)?.push(message);
        Ok(())
    }
}
