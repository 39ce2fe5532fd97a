//! Record shaping against a [`RecordSchema`]
//!
//! Shaping never fails. Fields that are undeclared or whose value does not
//! match the declared type are dropped and reported at debug level, so API
//! drift cannot abort a run.

use super::types::{JsonType, RecordSchema, SchemaProperty};
use crate::state::parse_timestamp;
use crate::types::JsonObject;
use chrono::SecondsFormat;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// A shaped record and the paths of the fields that were dropped
#[derive(Debug, Clone, Default)]
pub struct Shaped {
    /// Record containing only conforming fields
    pub record: JsonObject,
    /// Dotted paths of dropped fields
    pub dropped: Vec<String>,
}

impl RecordSchema {
    /// Keep declared, type-conforming fields and normalise date-times
    pub fn shape(&self, record: &JsonObject) -> Shaped {
        let mut dropped = Vec::new();
        let record = shape_object(&self.properties, record, "", &mut dropped);
        if !dropped.is_empty() {
            debug!(fields = ?dropped, "Dropped fields not matching schema");
        }
        Shaped { record, dropped }
    }
}

fn shape_object(
    properties: &std::collections::BTreeMap<String, SchemaProperty>,
    record: &JsonObject,
    prefix: &str,
    dropped: &mut Vec<String>,
) -> JsonObject {
    let mut out = JsonObject::new();
    for (key, value) in record {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match properties.get(key) {
            Some(property) => match shape_value(property, value, &path, dropped) {
                Some(shaped) => {
                    out.insert(key.clone(), shaped);
                }
                None => dropped.push(path),
            },
            None => dropped.push(path),
        }
    }
    out
}

/// Shape one value; `None` means the value does not conform and is dropped
fn shape_value(
    property: &SchemaProperty,
    value: &Value,
    path: &str,
    dropped: &mut Vec<String>,
) -> Option<Value> {
    let Some(types) = &property.json_type else {
        return Some(value.clone());
    };

    match value {
        Value::Null => types.is_nullable().then_some(Value::Null),
        Value::String(s) if types.contains(JsonType::String) => {
            if property.is_date_time() {
                normalize_date_time(s).map(Value::String)
            } else {
                Some(value.clone())
            }
        }
        Value::Number(n) => {
            if types.contains(JsonType::Number)
                || (types.contains(JsonType::Integer) && (n.is_i64() || n.is_u64()))
            {
                Some(value.clone())
            } else if types.contains(JsonType::Integer) {
                // Whole floats such as 3.0 are accepted as integers
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                    .map(|f| Value::from(f as i64))
            } else {
                None
            }
        }
        Value::Bool(_) if types.contains(JsonType::Boolean) => Some(value.clone()),
        Value::Object(map) if types.contains(JsonType::Object) => match &property.properties {
            Some(nested) => Some(Value::Object(shape_object(nested, map, path, dropped))),
            None => Some(value.clone()),
        },
        Value::Array(items) if types.contains(JsonType::Array) => match &property.items {
            Some(item_schema) => Some(Value::Array(
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| {
                        let item_path = format!("{path}[{i}]");
                        let shaped = shape_value(item_schema, item, &item_path, dropped);
                        if shaped.is_none() {
                            dropped.push(item_path);
                        }
                        shaped
                    })
                    .collect(),
            )),
            None => Some(value.clone()),
        },
        _ => None,
    }
}

/// Normalise a timestamp to RFC 3339 UTC; `None` when unparseable
pub fn normalize_date_time(value: &str) -> Option<String> {
    parse_timestamp(value).map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// Remove deselected top-level fields; key properties are always kept
pub fn apply_field_selection(
    record: &mut JsonObject,
    deselected: &BTreeSet<String>,
    key_properties: &[String],
) {
    if deselected.is_empty() {
        return;
    }
    record.retain(|field, _| !deselected.contains(field) || key_properties.contains(field));
}
