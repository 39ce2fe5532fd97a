//! Discovery catalog and stream/field selection
//!
//! The catalog uses the Singer layout: one entry per stream with its schema,
//! key properties and breadcrumb metadata. Selection is read back from the
//! same layout: stream-level `selected` flags and field-level
//! `selected: false` deselections.

use crate::error::{Error, Result};
use crate::stream::StreamDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

// ============================================================================
// Catalog
// ============================================================================

/// A discovery catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Catalog entries, one per stream
    pub streams: Vec<CatalogEntry>,
}

/// One stream in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stream identifier
    pub tap_stream_id: String,
    /// Stream name
    pub stream: String,
    /// JSON schema document
    pub schema: Value,
    /// Primary key fields
    #[serde(default)]
    pub key_properties: Vec<String>,
    /// `INCREMENTAL` or `FULL_TABLE`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_method: Option<String>,
    /// Cursor field for incremental streams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,
    /// Breadcrumb metadata
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
}

/// Metadata attached to a breadcrumb (`[]` for the stream, `["properties", f]` for a field)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Path of the node the metadata applies to
    pub breadcrumb: Vec<String>,
    /// Metadata values
    pub metadata: BTreeMap<String, Value>,
}

impl CatalogEntry {
    /// Stream-level metadata, if present
    fn stream_metadata(&self) -> Option<&BTreeMap<String, Value>> {
        self.metadata
            .iter()
            .find(|m| m.breadcrumb.is_empty())
            .map(|m| &m.metadata)
    }
}

impl Catalog {
    /// Read a catalog file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Find an entry by stream id
    pub fn get(&self, stream: &str) -> Option<&CatalogEntry> {
        self.streams.iter().find(|s| s.tap_stream_id == stream)
    }
}

/// Build the catalog for `definitions`.
///
/// Streams for which `enabled` returns false are listed with
/// `inclusion: unsupported`. With `select_all`, every supported stream is
/// marked selected.
pub fn discover(
    definitions: &[StreamDefinition],
    enabled: impl Fn(&str) -> bool,
    select_all: bool,
) -> Catalog {
    let streams = definitions
        .iter()
        .map(|def| {
            let supported = enabled(&def.name);
            let cursor = def.cursor_field().map(str::to_string);

            let mut stream_meta = BTreeMap::new();
            stream_meta.insert(
                "inclusion".to_string(),
                json!(if supported { "available" } else { "unsupported" }),
            );
            stream_meta.insert(
                "table-key-properties".to_string(),
                json!(def.key_properties),
            );
            stream_meta.insert(
                "forced-replication-method".to_string(),
                json!(def.sync_mode().replication_method()),
            );
            if let Some(cursor) = &cursor {
                stream_meta.insert("valid-replication-keys".to_string(), json!([cursor]));
            }
            if supported && select_all {
                stream_meta.insert("selected".to_string(), json!(true));
            }

            let mut metadata = vec![MetadataEntry {
                breadcrumb: Vec::new(),
                metadata: stream_meta,
            }];
            for field in def.schema.property_names() {
                let automatic = def.key_properties.iter().any(|k| k == field)
                    || cursor.as_deref() == Some(field);
                let mut field_meta = BTreeMap::new();
                field_meta.insert(
                    "inclusion".to_string(),
                    json!(if automatic { "automatic" } else { "available" }),
                );
                metadata.push(MetadataEntry {
                    breadcrumb: vec!["properties".to_string(), field.to_string()],
                    metadata: field_meta,
                });
            }

            CatalogEntry {
                tap_stream_id: def.name.clone(),
                stream: def.name.clone(),
                schema: def.schema.to_json(),
                key_properties: def.key_properties.clone(),
                replication_method: Some(def.sync_mode().replication_method().to_string()),
                replication_key: cursor,
                metadata,
            }
        })
        .collect();

    Catalog { streams }
}

// ============================================================================
// Selection
// ============================================================================

/// Selected streams and, per stream, deselected fields. Immutable for a run.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// `None` selects every stream
    streams: Option<BTreeSet<String>>,
    /// Deselected top-level fields per stream
    deselected: BTreeMap<String, BTreeSet<String>>,
}

static NO_FIELDS: BTreeSet<String> = BTreeSet::new();

impl Selection {
    /// Select every stream and every field
    pub fn all() -> Self {
        Self::default()
    }

    /// Select exactly the named streams
    pub fn streams<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            streams: Some(names.into_iter().map(Into::into).collect()),
            deselected: BTreeMap::new(),
        }
    }

    /// Deselect a field of a stream
    #[must_use]
    pub fn without_field(mut self, stream: &str, field: &str) -> Self {
        self.deselected
            .entry(stream.to_string())
            .or_default()
            .insert(field.to_string());
        self
    }

    /// Read selection from a catalog
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut streams = BTreeSet::new();
        let mut deselected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for entry in &catalog.streams {
            let stream_meta = entry.stream_metadata();
            let unsupported = stream_meta
                .and_then(|m| m.get("inclusion"))
                .and_then(Value::as_str)
                == Some("unsupported");
            let selected = stream_meta
                .and_then(|m| m.get("selected"))
                .and_then(Value::as_bool)
                .unwrap_or(false);

            if unsupported {
                if selected {
                    warn!(stream = %entry.tap_stream_id, "Ignoring selection of unsupported stream");
                }
                continue;
            }
            if !selected {
                continue;
            }
            streams.insert(entry.tap_stream_id.clone());

            for meta in &entry.metadata {
                if let [kind, field] = meta.breadcrumb.as_slice() {
                    let field_selected = meta.metadata.get("selected").and_then(Value::as_bool);
                    if kind == "properties" && field_selected == Some(false) {
                        deselected
                            .entry(entry.tap_stream_id.clone())
                            .or_default()
                            .insert(field.clone());
                    }
                }
            }
        }

        debug!(streams = ?streams, "Selection read from catalog");
        Self {
            streams: Some(streams),
            deselected,
        }
    }

    /// Whether a stream's records are emitted
    pub fn is_selected(&self, stream: &str) -> bool {
        self.streams.as_ref().map_or(true, |s| s.contains(stream))
    }

    /// Deselected fields for a stream (empty when none)
    pub fn deselected_fields(&self, stream: &str) -> &BTreeSet<String> {
        self.deselected.get(stream).unwrap_or(&NO_FIELDS)
    }
}
