//! Partition router implementations
//!
//! Each router handles a specific partitioning strategy.

use super::types::{PartitionRouter, PartitionValue};
use crate::error::Result;
use crate::types::JsonObject;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

// ============================================================================
// List Router
// ============================================================================

/// List-based partition router
///
/// Creates partitions from configured identifiers (group or project ids).
#[derive(Debug, Clone)]
pub struct ListRouter {
    /// Configured values
    values: Vec<String>,
    /// Field name the value is exposed under
    partition_field: String,
}

impl ListRouter {
    /// Create a new list router
    pub fn new(values: Vec<String>, partition_field: impl Into<String>) -> Self {
        Self {
            values,
            partition_field: partition_field.into(),
        }
    }
}

impl PartitionRouter for ListRouter {
    fn partitions(&self) -> Result<Vec<PartitionValue>> {
        let mut seen = HashSet::new();
        Ok(self
            .values
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && seen.insert(v.to_string()))
            .map(|v| {
                // Numeric ids stay numbers so injected `*_id` fields match integer schemas
                let value = v
                    .parse::<i64>()
                    .map_or_else(|_| Value::String(v.to_string()), Value::from);
                PartitionValue::new(v).with_value(self.partition_field.clone(), value)
            })
            .collect())
    }

    fn partition_field(&self) -> &str {
        &self.partition_field
    }
}

// ============================================================================
// Parent Router
// ============================================================================

/// Parent stream-based partition router
///
/// Creates one partition per materialized parent record. The parent key is a
/// dotted path that may cross arrays: `projects.id` on a group record yields
/// one partition per element of `projects`, carrying that element's fields.
#[derive(Debug, Clone)]
pub struct ParentRouter {
    /// Records from parent stream
    parent_records: Vec<Value>,
    /// Key to extract from parent records
    parent_key: String,
}

impl ParentRouter {
    /// Create a new parent router
    pub fn new(parent_records: Vec<Value>, parent_key: impl Into<String>) -> Self {
        Self {
            parent_records,
            parent_key: parent_key.into(),
        }
    }

    /// Collect (owning object, key value) pairs reachable through `parts`
    fn collect<'a>(value: &'a Value, parts: &[&str], out: &mut Vec<(&'a JsonObject, &'a Value)>) {
        match value {
            Value::Array(items) => {
                for item in items {
                    Self::collect(item, parts, out);
                }
            }
            Value::Object(map) => match parts {
                [] => {}
                [last] => {
                    if let Some(found) = map.get(*last) {
                        out.push((map, found));
                    }
                }
                [head, rest @ ..] => {
                    if let Some(next) = map.get(*head) {
                        Self::collect(next, rest, out);
                    }
                }
            },
            _ => {}
        }
    }
}

impl PartitionRouter for ParentRouter {
    fn partitions(&self) -> Result<Vec<PartitionValue>> {
        let parts: Vec<&str> = self.parent_key.split('.').collect();
        let mut partitions = Vec::new();
        let mut seen = HashSet::new();

        for record in &self.parent_records {
            let mut found = Vec::new();
            Self::collect(record, &parts, &mut found);
            if found.is_empty() {
                debug!(parent_key = %self.parent_key, "Parent record has no key, skipping");
            }

            for (owner, key_value) in found {
                let id = match key_value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => continue,
                };
                // Deduplicate
                if seen.insert(id.clone()) {
                    partitions.push(PartitionValue::from_record(id, owner.clone()));
                }
            }
        }

        Ok(partitions)
    }

    fn partition_field(&self) -> &str {
        &self.parent_key
    }
}

/// Extract a value from JSON using a simple path (e.g., "time_stats.time_estimate")
pub fn extract_json_path(value: &Value, path: &str) -> Option<Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    let parts: Vec<&str> = path.split('.').collect();

    let mut current = value;
    for part in parts {
        // Handle array index like "records[0]"
        if let Some(bracket_pos) = part.find('[') {
            let key = &part[..bracket_pos];
            let idx_str = part[bracket_pos + 1..].trim_end_matches(']');

            current = current.get(key)?;
            current = current.get(idx_str.parse::<usize>().ok()?)?;
        } else {
            current = current.get(part)?;
        }
    }

    Some(current.clone())
}
