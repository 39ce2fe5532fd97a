//! Tap configuration
//!
//! Configuration is loaded from a JSON or YAML file (chosen by extension).
//! Feature flags accept booleans as well as truthy strings, and the
//! `groups`/`projects` selections are space-delimited lists.

use crate::error::{Error, Result};
use crate::state::parse_timestamp;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Strings accepted as `true` for feature flags
const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];

// ============================================================================
// Top-Level Tap Config
// ============================================================================

/// Complete tap configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// Base API URL (e.g. `https://gitlab.com/api/v4`)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Personal access token sent as `Private-Token`
    #[serde(default, skip_serializing)]
    pub private_token: String,

    /// Group ids or full paths to extract
    #[serde(default, deserialize_with = "deserialize_id_list")]
    pub groups: Vec<String>,

    /// Project ids or full paths to extract
    #[serde(default, deserialize_with = "deserialize_id_list")]
    pub projects: Vec<String>,

    /// Earliest timestamp to fetch for incremental streams
    #[serde(default)]
    pub start_date: Option<String>,

    /// Optional User-Agent header
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Directory for the on-disk response cache
    #[serde(default)]
    pub requests_cache_path: Option<PathBuf>,

    /// Enables epics and epic issues
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub ultimate_license: bool,

    /// Enables one commits request per merge request
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub fetch_merge_request_commits: bool,

    /// Enables one detail request per pipeline
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub fetch_pipelines_extended: bool,

    /// Enables one bridges request per pipeline
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub fetch_bridges: bool,

    /// Enables group CI variables (may expose secrets)
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub fetch_group_variables: bool,

    /// Enables project CI variables (may expose secrets)
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub fetch_project_variables: bool,

    /// Enables the instance-wide users listing
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub fetch_site_users: bool,

    /// Engine tuning knobs
    #[serde(flatten)]
    pub engine: EngineSettings,
}

fn default_api_url() -> String {
    "https://gitlab.com/api/v4".to_string()
}

impl TapConfig {
    /// Load configuration from a JSON or YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        let config: TapConfig = if is_yaml {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };

        Ok(config.normalized())
    }

    /// Build configuration from a JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let config: TapConfig = serde_json::from_value(value)?;
        Ok(config.normalized())
    }

    /// Trim the token and make sure the API URL points at the REST root
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.private_token = self.private_token.trim().to_string();
        self.api_url = normalize_api_url(&self.api_url);
        self.start_date = self
            .start_date
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.private_token.is_empty() {
            return Err(Error::missing_field("private_token"));
        }

        if let Some(start) = &self.start_date {
            if parse_timestamp(start).is_none() {
                return Err(Error::invalid_value(
                    "start_date",
                    format!("'{start}' is not an RFC 3339 timestamp or YYYY-MM-DD date"),
                ));
            }
        }

        url::Url::parse(&self.api_url)?;

        self.engine.validate()
    }

    /// JSON view used as the `config` template context (token excluded)
    pub fn template_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl std::fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapConfig")
            .field("api_url", &self.api_url)
            .field("private_token", &"[REDACTED]")
            .field("groups", &self.groups)
            .field("projects", &self.projects)
            .field("start_date", &self.start_date)
            .field("user_agent", &self.user_agent)
            .field("requests_cache_path", &self.requests_cache_path)
            .field("ultimate_license", &self.ultimate_license)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

/// Append `/api/v4` when the URL has no `/api/` segment
fn normalize_api_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.contains("/api/") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/api/v4")
    }
}

// ============================================================================
// Engine Settings
// ============================================================================

/// Concurrency, retry, and paging knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Size of the worker pool
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Retries after the first attempt of a request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff cap in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Hard page limit per stream instance
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Default page size
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Pages between mid-stream checkpoints
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval_pages: usize,

    /// Client-side request rate limit
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_pages: default_max_pages(),
            page_size: default_page_size(),
            checkpoint_interval_pages: default_checkpoint_interval(),
            requests_per_second: default_rps(),
            request_timeout_secs: default_timeout(),
        }
    }
}

impl EngineSettings {
    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::invalid_value("max_workers", "must be at least 1"));
        }
        if self.max_pages == 0 {
            return Err(Error::invalid_value("max_pages", "must be at least 1"));
        }
        if self.page_size == 0 || self.page_size > 100 {
            return Err(Error::invalid_value("page_size", "must be between 1 and 100"));
        }
        if self.checkpoint_interval_pages == 0 {
            return Err(Error::invalid_value(
                "checkpoint_interval_pages",
                "must be at least 1",
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(Error::invalid_value(
                "initial_backoff_ms",
                "must not exceed max_backoff_ms",
            ));
        }
        Ok(())
    }
}

fn default_max_workers() -> usize {
    4
}

fn default_max_retries() -> u32 {
    4
}

fn default_initial_backoff_ms() -> u64 {
    2000
}

fn default_max_backoff_ms() -> u64 {
    60000
}

fn default_max_pages() -> usize {
    10000
}

fn default_page_size() -> u32 {
    100
}

fn default_checkpoint_interval() -> usize {
    10
}

fn default_rps() -> u32 {
    10
}

fn default_timeout() -> u64 {
    30
}

// ============================================================================
// Lenient Deserializers
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Number(i64),
    Text(String),
}

fn deserialize_truthy<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<FlagValue>::deserialize(deserializer)?;
    Ok(match value {
        None => false,
        Some(FlagValue::Bool(b)) => b,
        Some(FlagValue::Number(n)) => n == 1,
        Some(FlagValue::Text(s)) => TRUTHY.contains(&s.trim().to_lowercase().as_str()),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdList {
    Text(String),
    List(Vec<serde_json::Value>),
}

fn deserialize_id_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<IdList>::deserialize(deserializer)?;
    Ok(match value {
        None => Vec::new(),
        Some(IdList::Text(s)) => s.split_whitespace().map(str::to_string).collect(),
        Some(IdList::List(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
    })
}
