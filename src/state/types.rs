//! Bookmark document and timestamp ordering
//!
//! The persisted state is a flat JSON object mapping stream keys to ISO-8601
//! progress values. Progress values compare chronologically.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::warn;

/// Stream key to progress value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkDocument {
    bookmarks: BTreeMap<String, String>,
}

impl BookmarkDocument {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a persisted JSON value.
    ///
    /// Accepts the flat layout as well as a `{"bookmarks": {...}}` wrapper.
    /// Non-string values are skipped with a warning.
    pub fn from_value(value: &Value) -> Self {
        let map = match value {
            Value::Object(map) => match map.get("bookmarks") {
                Some(Value::Object(inner)) => inner,
                _ => map,
            },
            Value::Null => return Self::new(),
            other => {
                warn!("Ignoring state document that is not an object: {other}");
                return Self::new();
            }
        };

        let mut doc = Self::new();
        for (key, value) in map {
            match value {
                Value::String(progress) => {
                    doc.bookmarks.insert(key.clone(), progress.clone());
                }
                Value::Null => {}
                other => warn!(key = %key, "Ignoring non-string bookmark value {other}"),
            }
        }
        doc
    }

    /// Get the progress value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.bookmarks.get(key).map(String::as_str)
    }

    /// Insert a progress value unconditionally
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.bookmarks.insert(key.into(), value.into());
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    /// Whether the document is empty
    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }

    /// Iterate over keys and values in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bookmarks
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// JSON form of the document
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Parse an RFC 3339 timestamp, a naive timestamp, or a bare date (as UTC)
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Compare two progress values chronologically, lexically if either is not a timestamp
pub fn compare_progress(a: &str, b: &str) -> Ordering {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// The later of two progress values
pub fn max_progress<'a>(a: &'a str, b: &'a str) -> &'a str {
    if compare_progress(a, b) == Ordering::Less {
        b
    } else {
        a
    }
}
