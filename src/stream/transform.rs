//! Record transforms applied before schema shaping

use crate::partition::{extract_json_path, PartitionValue};
use crate::types::JsonObject;
use serde_json::Value;

/// One record rewrite step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// `author: {id: 1, ..}` becomes `author_id: 1` (null when absent)
    FlattenId(String),
    /// `assignees: [{id: 1}, {id: 2}]` becomes `assignees: [1, 2]`
    IdArray(String),
    /// Lift fields of a nested object to the top level, null when absent
    Hoist {
        /// Nested object field
        from: String,
        /// Fields to lift
        fields: Vec<String>,
    },
    /// Copy a field under another name
    Copy {
        /// Source field
        from: String,
        /// Target field
        to: String,
    },
    /// Inject a partition value (e.g. the parent `project_id`)
    PartitionField {
        /// Partition field
        from: String,
        /// Target record field
        to: String,
    },
}

impl Transform {
    /// Flatten `field` into `field_id`
    pub fn flatten_id(field: &str) -> Self {
        Self::FlattenId(field.to_string())
    }

    /// Replace an array of objects by their ids
    pub fn id_array(field: &str) -> Self {
        Self::IdArray(field.to_string())
    }

    /// Lift `fields` out of `from`
    pub fn hoist(from: &str, fields: &[&str]) -> Self {
        Self::Hoist {
            from: from.to_string(),
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
        }
    }

    /// Copy `from` to `to`
    pub fn copy(from: &str, to: &str) -> Self {
        Self::Copy {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Inject partition field `from` as `to`
    pub fn partition_field(from: &str, to: &str) -> Self {
        Self::PartitionField {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Apply to one record
    pub fn apply(&self, record: &mut JsonObject, partition: Option<&PartitionValue>) {
        match self {
            Self::FlattenId(field) => {
                let id = record
                    .remove(field)
                    .and_then(|v| v.get("id").cloned())
                    .unwrap_or(Value::Null);
                record.insert(format!("{field}_id"), id);
            }
            Self::IdArray(field) => {
                if let Some(Value::Array(items)) = record.get_mut(field) {
                    let ids = items
                        .iter()
                        .filter_map(|item| item.get("id").cloned())
                        .collect();
                    *items = ids;
                }
            }
            Self::Hoist { from, fields } => {
                let nested = record.get(from).cloned().unwrap_or(Value::Null);
                for field in fields {
                    let value = extract_json_path(&nested, field).unwrap_or(Value::Null);
                    record.insert(field.clone(), value);
                }
            }
            Self::Copy { from, to } => {
                if let Some(value) = record.get(from).cloned() {
                    record.insert(to.clone(), value);
                }
            }
            Self::PartitionField { from, to } => {
                if let Some(value) = partition.and_then(|p| p.get(from)) {
                    record.insert(to.clone(), value.clone());
                }
            }
        }
    }
}

/// Apply transforms in order
pub fn apply_all(transforms: &[Transform], record: &mut JsonObject, partition: Option<&PartitionValue>) {
    for transform in transforms {
        transform.apply(record, partition);
    }
}
