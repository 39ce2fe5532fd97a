//! Pagination types and traits
//!
//! Defines the request descriptor and the core pagination abstraction used by
//! all strategies.

use super::pages::decode_records;
use super::strategies::{NextPageHeaderPaginator, NoPaginator};
use crate::error::{Error, Result};
use crate::http::HttpResponse;
use serde_json::{Map, Value};

/// One page request: absolute URL, base query, and the page token.
///
/// A descriptor is never mutated after it is issued; following a cursor
/// produces a new one via [`PageRequest::with_page`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Absolute URL
    pub url: String,
    /// Query parameters sent with every page
    pub query: Vec<(String, String)>,
    /// Page token, `None` for the first page
    pub page_token: Option<String>,
}

impl PageRequest {
    /// Create a descriptor for the first page
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            page_token: None,
        }
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Descriptor for the page identified by `token`
    #[must_use]
    pub fn with_page(&self, token: impl Into<String>) -> Self {
        Self {
            url: self.url.clone(),
            query: self.query.clone(),
            page_token: Some(token.into()),
        }
    }
}

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available at this token
    Continue {
        /// Token identifying the next page
        token: String,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Create a continuation
    pub fn token(token: impl Into<String>) -> Self {
        Self::Continue {
            token: token.into(),
        }
    }

    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Per-definition pagination behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationConfig {
    /// Single request, single object or array
    None,

    /// GitLab `X-Next-Page` header pagination
    NextPageHeader {
        /// Page size override; `None` uses the engine default
        page_size: Option<u32>,
    },
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self::NextPageHeader { page_size: None }
    }
}

impl PaginationConfig {
    /// Header pagination pinned to a fixed page size
    pub fn fixed_page_size(page_size: u32) -> Self {
        Self::NextPageHeader {
            page_size: Some(page_size),
        }
    }

    /// Create the paginator for one stream instance
    pub fn build(&self, default_page_size: u32) -> Box<dyn Paginator> {
        match self {
            Self::None => Box::new(NoPaginator),
            Self::NextPageHeader { page_size } => Box::new(NextPageHeaderPaginator::new(
                page_size.unwrap_or(default_page_size),
            )),
        }
    }
}

/// How one response body becomes records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    /// JSON array of objects, a single object, or an empty body
    #[default]
    Json,

    /// JSON object whose entries become one row each
    KeyValue {
        /// Field receiving the entry name
        key_field: String,
        /// Field receiving the entry value
        value_field: String,
    },

    /// Whole body as one record
    Raw {
        /// Field receiving the body text
        field: String,
    },
}

impl ResponseFormat {
    /// `{"Ruby": 66.7}` becomes `[{key_field: "Ruby", value_field: 66.7}]`
    pub fn key_value(key_field: &str, value_field: &str) -> Self {
        Self::KeyValue {
            key_field: key_field.to_string(),
            value_field: value_field.to_string(),
        }
    }

    /// The body text becomes `[{field: body}]`
    pub fn raw(field: &str) -> Self {
        Self::Raw {
            field: field.to_string(),
        }
    }

    /// Decode one response
    pub fn decode(&self, response: &HttpResponse) -> Result<Vec<Value>> {
        match self {
            Self::Json => decode_records(response),
            Self::KeyValue {
                key_field,
                value_field,
            } => {
                if response.body.trim().is_empty() {
                    return Ok(Vec::new());
                }
                let value: Value = serde_json::from_str(&response.body)
                    .map_err(|e| Error::decode(format!("invalid JSON body: {e}")))?;
                let entries = match value {
                    Value::Object(entries) => entries,
                    other => {
                        return Err(Error::decode(format!("expected an object, got {other}")))
                    }
                };
                Ok(entries
                    .into_iter()
                    .map(|(name, value)| {
                        let mut row = Map::new();
                        row.insert(key_field.clone(), Value::String(name));
                        row.insert(value_field.clone(), value);
                        Value::Object(row)
                    })
                    .collect())
            }
            Self::Raw { field } => {
                let mut row = Map::new();
                row.insert(field.clone(), Value::String(response.body.clone()));
                Ok(vec![Value::Object(row)])
            }
        }
    }
}

/// Tracks pagination state during iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Pages fetched so far
    pub pages: usize,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Record one fetched page
    pub fn add_page(&mut self) {
        self.pages += 1;
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync {
    /// Query parameters selecting the page for `token` (`None` = first page)
    fn page_params(&self, token: Option<&str>) -> Vec<(String, String)>;

    /// Process a response and determine if there's a next page
    fn process_response(&self, response: &HttpResponse, state: &mut PaginationState) -> NextPage;
}
