//! Error types for the GitLab tap
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Every error maps onto one of three handling classes (see [`ErrorClass`]):
//! resource-missing conditions are skipped per parent instance, retryable
//! conditions go through the retry policy, and everything else aborts the run.

use thiserror::Error;

/// The main error type for the GitLab tap
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Resource not accessible (HTTP {status}): {url}")]
    ResourceMissing { status: u16, url: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Max retries ({max_retries}) exceeded for {url}: {last_error}")]
    MaxRetriesExceeded {
        max_retries: u32,
        url: String,
        last_error: String,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    #[error("Checkpoint failed: {message}")]
    Checkpoint { message: String },

    #[error("Output error: {message}")]
    Output { message: String },

    // ============================================================================
    // Stream Graph Errors
    // ============================================================================
    #[error("Stream '{stream}' not found")]
    StreamNotFound { stream: String },

    #[error("Stream '{stream}' is defined more than once")]
    DuplicateStream { stream: String },

    #[error("Stream '{stream}' depends on unknown parent '{parent}'")]
    UnknownParent { stream: String, parent: String },

    #[error("Stream dependency cycle involving '{stream}'")]
    CyclicDependency { stream: String },

    #[error("Run cancelled")]
    Cancelled,

    // ============================================================================
    // Template Errors
    // ============================================================================
    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Undefined variable in template: {variable}")]
    UndefinedVariable { variable: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

/// How an error is handled by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Inaccessible or missing resource: skip this instance, keep going
    ResourceMissing,
    /// Transient failure: retry with backoff
    Retryable,
    /// Abort the run after a best-effort checkpoint
    Fatal,
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            body: body.into(),
        }
    }

    /// Create a resource-missing error
    pub fn resource_missing(status: u16, url: impl Into<String>) -> Self {
        Self::ResourceMissing {
            status,
            url: url.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create an undefined variable error
    pub fn undefined_var(variable: impl Into<String>) -> Self {
        Self::UndefinedVariable {
            variable: variable.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Classify this error for retry/skip/abort decisions
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::ResourceMissing { .. } => ErrorClass::ResourceMissing,
            Error::Timeout { .. } => ErrorClass::Retryable,
            Error::Http(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                ErrorClass::Retryable
            }
            Error::HttpStatus { status, .. } => {
                classify_status(*status).unwrap_or(ErrorClass::Fatal)
            }
            _ => ErrorClass::Fatal,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// Check if this error only concerns one inaccessible resource
    pub fn is_resource_missing(&self) -> bool {
        self.class() == ErrorClass::ResourceMissing
    }
}

/// Classify an HTTP status code. Returns `None` for success.
pub fn classify_status(status: u16) -> Option<ErrorClass> {
    match status {
        200..=299 => None,
        401 | 403 | 404 => Some(ErrorClass::ResourceMissing),
        429 | 500..=599 => Some(ErrorClass::Retryable),
        _ => Some(ErrorClass::Fatal),
    }
}

/// Result type alias for the GitLab tap
pub type Result<T> = std::result::Result<T, Error>;
