//! Stream definitions
//!
//! A [`StreamDefinition`] is a static, data-only description of one resource
//! type. The sync algorithm in [`super::sync`] is generic over it.

use super::transform::Transform;
use crate::pagination::{PaginationConfig, ResponseFormat};
use crate::schema::RecordSchema;
use crate::types::SyncMode;

/// How the incremental lower bound reaches the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncrementalFilter {
    /// Sent as a query parameter (`updated_after`, `since`)
    ServerSide {
        /// Query parameter name
        param: String,
    },
    /// Applied to fetched records
    ClientSide {
        /// Stop paging once a page ends older than the bound (descending endpoints)
        stop_when_older: bool,
    },
}

/// Incremental replication settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incremental {
    /// Record field holding the cursor (an update timestamp)
    pub cursor_field: String,
    /// Where the lower bound is applied
    pub filter: IncrementalFilter,
    /// Records arrive in ascending cursor order
    pub sorted: bool,
}

/// Static descriptor of one stream
#[derive(Debug, Clone)]
pub struct StreamDefinition {
    /// Stream name
    pub name: String,
    /// Path template appended to the API URL
    pub path: String,
    /// Static query parameters (values may be templates)
    pub query: Vec<(String, String)>,
    /// Record schema
    pub schema: RecordSchema,
    /// Primary key fields
    pub key_properties: Vec<String>,
    /// Incremental settings; `None` is a full-refresh stream
    pub incremental: Option<Incremental>,
    /// Parent stream names
    pub parents: Vec<String>,
    /// Path into parent records selecting the partition id
    pub parent_key: String,
    /// Configured partition ids for top-level streams
    pub partitions: Vec<String>,
    /// Stream key template; `None` uses [`StreamDefinition::key_template`]
    pub key: Option<String>,
    /// Pagination behavior
    pub pagination: PaginationConfig,
    /// How each response body becomes records
    pub format: ResponseFormat,
    /// Record transforms, applied in order before shaping
    pub transforms: Vec<Transform>,
}

impl StreamDefinition {
    /// Create a full-refresh, top-level definition
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            query: Vec::new(),
            schema: RecordSchema::new(),
            key_properties: Vec::new(),
            incremental: None,
            parents: Vec::new(),
            parent_key: "id".to_string(),
            partitions: Vec::new(),
            key: None,
            pagination: PaginationConfig::default(),
            format: ResponseFormat::default(),
            transforms: Vec::new(),
        }
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set the record schema
    #[must_use]
    pub fn schema(mut self, schema: RecordSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Set key properties
    #[must_use]
    pub fn key_properties(mut self, keys: &[&str]) -> Self {
        self.key_properties = keys.iter().map(|k| (*k).to_string()).collect();
        self
    }

    /// Incremental with the lower bound sent as a query parameter
    #[must_use]
    pub fn server_side(mut self, cursor_field: &str, param: &str) -> Self {
        self.incremental = Some(Incremental {
            cursor_field: cursor_field.to_string(),
            filter: IncrementalFilter::ServerSide {
                param: param.to_string(),
            },
            sorted: false,
        });
        self
    }

    /// Incremental with the lower bound applied to fetched records
    #[must_use]
    pub fn client_side(mut self, cursor_field: &str, stop_when_older: bool) -> Self {
        self.incremental = Some(Incremental {
            cursor_field: cursor_field.to_string(),
            filter: IncrementalFilter::ClientSide { stop_when_older },
            sorted: false,
        });
        self
    }

    /// Mark records as arriving in ascending cursor order
    #[must_use]
    pub fn sorted(mut self) -> Self {
        if let Some(incremental) = &mut self.incremental {
            incremental.sorted = true;
        }
        self
    }

    /// Scope this stream under a parent stream
    #[must_use]
    pub fn parent(mut self, parent: &str, parent_key: &str) -> Self {
        self.parents.push(parent.to_string());
        self.parent_key = parent_key.to_string();
        self
    }

    /// Run once per configured id
    #[must_use]
    pub fn partitions(mut self, ids: Vec<String>) -> Self {
        self.partitions = ids;
        self
    }

    /// Set the stream key template
    #[must_use]
    pub fn key(mut self, template: &str) -> Self {
        self.key = Some(template.to_string());
        self
    }

    /// Set pagination behavior
    #[must_use]
    pub fn pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// Set how response bodies are decoded
    #[must_use]
    pub fn format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }

    /// Append a transform
    #[must_use]
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Whether this stream has no parents
    pub fn is_top_level(&self) -> bool {
        self.parents.is_empty()
    }

    /// Whether this stream runs once per partition
    pub fn is_partitioned(&self) -> bool {
        !self.parents.is_empty() || !self.partitions.is_empty()
    }

    /// Incremental cursor field
    pub fn cursor_field(&self) -> Option<&str> {
        self.incremental.as_ref().map(|i| i.cursor_field.as_str())
    }

    /// Replication mode
    pub fn sync_mode(&self) -> SyncMode {
        if self.incremental.is_some() {
            SyncMode::Incremental
        } else {
            SyncMode::FullRefresh
        }
    }

    /// Key template, defaulting to `{name}` or `{name}_{{ partition.id }}`
    pub fn key_template(&self) -> String {
        match &self.key {
            Some(key) => key.clone(),
            None if self.is_partitioned() => format!("{}_{{{{ partition.id }}}}", self.name),
            None => self.name.clone(),
        }
    }
}
