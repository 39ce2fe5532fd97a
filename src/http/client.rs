//! HTTP transport and the reqwest-backed client
//!
//! The [`Transport`] trait is the single primitive the engine consumes:
//! `GET(url, query) -> (status, headers, body)`. Non-2xx statuses are
//! returned as responses, never raised; classification happens in
//! [`RetryPolicy`](super::RetryPolicy).

use super::cache::ResponseCache;
use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::config::TapConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, trace};

// ============================================================================
// Response
// ============================================================================

/// A fully read HTTP response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Headers with lowercase names
    pub headers: BTreeMap<String, String>,
    /// Response body
    pub body: String,
}

impl HttpResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse a numeric `Retry-After` header
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

// ============================================================================
// Transport
// ============================================================================

/// The GET primitive used by the paginator
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET request against an absolute URL
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse>;
}

// ============================================================================
// Client Config
// ============================================================================

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: BTreeMap<String, String>,
    /// User agent string
    pub user_agent: String,
    /// Directory for the response cache
    pub cache_dir: Option<PathBuf>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            rate_limit: Some(RateLimiterConfig::default()),
            default_headers: BTreeMap::new(),
            user_agent: format!("gitlab-tap/{}", env!("CARGO_PKG_VERSION")),
            cache_dir: None,
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }

    /// Derive the client configuration from the tap configuration
    pub fn from_tap_config(config: &TapConfig) -> Self {
        let mut builder = Self::builder()
            .timeout(config.engine.request_timeout())
            .rate_limit(RateLimiterConfig::per_second(
                config.engine.requests_per_second,
            ))
            .header("Private-Token", config.private_token.clone());

        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        if let Some(dir) = &config.requests_cache_path {
            builder = builder.cache_dir(dir.clone());
        }
        builder.build()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Enable the on-disk response cache
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = Some(dir.into());
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

// ============================================================================
// Client
// ============================================================================

/// reqwest-backed transport with rate limiting and optional caching
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
    cache: Option<ResponseCache>,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (key, value) in &config.default_headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| Error::config(format!("invalid header name '{key}': {e}")))?;
            let mut value = HeaderValue::from_str(value)
                .map_err(|e| Error::config(format!("invalid value for header '{key}': {e}")))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);
        let cache = config.cache_dir.clone().map(ResponseCache::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
            cache,
        })
    }

    /// Create a client for the given tap configuration
    pub fn from_tap_config(config: &TapConfig) -> Result<Self> {
        Self::with_config(HttpClientConfig::from_tap_config(config))
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Check if response caching is enabled
    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    async fn send(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                timeout_ms: self.config.timeout.as_millis() as u64,
            }
        } else {
            Error::Http(e)
        }
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(url, query).await {
                trace!(url, "Response cache hit");
                return Ok(hit);
            }
        }

        if let Some(limiter) = &self.rate_limiter {
            limiter.wait().await;
        }

        let response = self.send(url, query).await?;
        debug!(url, status = response.status, "GET");

        if let Some(cache) = &self.cache {
            if response.is_success() {
                cache.put(url, query, &response).await;
            }
        }

        Ok(response)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("timeout", &self.config.timeout)
            .field("user_agent", &self.config.user_agent)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .field("has_cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}
