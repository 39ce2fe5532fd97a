//! Partition types and traits
//!
//! A partition is the unit a child stream fans out over: one configured id,
//! or one materialized parent record.

use crate::error::Result;
use crate::types::JsonObject;
use serde_json::Value;

/// A single partition value
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionValue {
    /// Unique identifier for this partition
    pub id: String,
    /// Values exposed to templates as `partition.*`
    pub values: JsonObject,
}

impl PartitionValue {
    /// Create a new partition value
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: JsonObject::new(),
        }
    }

    /// Create a partition carrying all fields of a parent record
    pub fn from_record(id: impl Into<String>, record: JsonObject) -> Self {
        Self {
            id: id.into(),
            values: record,
        }
    }

    /// Add a value to the partition
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a string value by key
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Template view of this partition
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

/// Trait for partition routers
pub trait PartitionRouter: Send + Sync {
    /// Partitions to run, deduplicated by id, in first-seen order
    fn partitions(&self) -> Result<Vec<PartitionValue>>;

    /// Field the partition id was taken from
    fn partition_field(&self) -> &str;
}
