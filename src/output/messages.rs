//! Output messages
//!
//! Serialized one per line in the Singer layout:
//! `{"type":"RECORD","stream":"issues","record":{...},"time_extracted":"..."}`.

use crate::schema::RecordSchema;
use crate::types::JsonObject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message emitted during sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Record schema, emitted once per selected stream before its records
    Schema {
        /// Stream name
        stream: String,
        /// JSON schema document
        schema: Value,
        /// Primary key fields
        key_properties: Vec<String>,
        /// Cursor field for incremental streams
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        bookmark_properties: Vec<String>,
    },
    /// One shaped record
    Record {
        /// Stream name
        stream: String,
        /// Stream key of the instance that produced the record
        #[serde(skip)]
        key: String,
        /// Record data
        record: JsonObject,
        /// When the record was extracted
        time_extracted: DateTime<Utc>,
    },
    /// Bookmark snapshot
    State {
        /// Full bookmark document
        value: Value,
    },
}

impl Message {
    /// Create a schema message
    pub fn schema(
        stream: impl Into<String>,
        schema: &RecordSchema,
        key_properties: &[String],
        bookmark_properties: Option<&str>,
    ) -> Self {
        Self::Schema {
            stream: stream.into(),
            schema: schema.to_json(),
            key_properties: key_properties.to_vec(),
            bookmark_properties: bookmark_properties.map(str::to_string).into_iter().collect(),
        }
    }

    /// Create a record message stamped with the current time
    pub fn record(stream: impl Into<String>, key: impl Into<String>, record: JsonObject) -> Self {
        Self::Record {
            stream: stream.into(),
            key: key.into(),
            record,
            time_extracted: Utc::now(),
        }
    }

    /// Create a state message
    pub fn state(value: Value) -> Self {
        Self::State { value }
    }

    /// Stream this message belongs to (none for state)
    pub fn stream(&self) -> Option<&str> {
        match self {
            Self::Schema { stream, .. } | Self::Record { stream, .. } => Some(stream),
            Self::State { .. } => None,
        }
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Check if this is a schema message
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }

    /// Serialize to one JSON line (without trailing newline)
    pub fn to_line(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
