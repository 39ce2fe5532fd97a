//! On-disk response cache
//!
//! Entries are JSON files named by a SHA-256 signature of the URL and the
//! sorted query. Auth headers never take part in the key. Only 2xx responses
//! are stored, and entries expire after 24 hours.

use super::client::HttpResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Default entry lifetime
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    stored_at: DateTime<Utc>,
    response: HttpResponse,
}

/// File-backed cache of successful GET responses
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ttl: DEFAULT_TTL,
        }
    }

    /// Override the entry lifetime
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Request signature: hex SHA-256 over the URL and the sorted query
    pub fn key(url: &str, query: &[(String, String)]) -> String {
        let mut params: Vec<&(String, String)> = query.iter().collect();
        params.sort();

        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        for (name, value) in params {
            hasher.update(b"\n");
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, url: &str, query: &[(String, String)]) -> PathBuf {
        self.dir.join(format!("{}.json", Self::key(url, query)))
    }

    /// Look up a fresh entry
    pub async fn get(&self, url: &str, query: &[(String, String)]) -> Option<HttpResponse> {
        let path = self.entry_path(url, query);
        let content = tokio::fs::read(&path).await.ok()?;

        let entry: CacheEntry = match serde_json::from_slice(&content) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Ignoring unreadable cache entry");
                return None;
            }
        };

        let age = Utc::now()
            .signed_duration_since(entry.stored_at)
            .to_std()
            .unwrap_or_default();
        if age > self.ttl {
            return None;
        }

        Some(entry.response)
    }

    /// Store a successful response; failures are logged and ignored
    pub async fn put(&self, url: &str, query: &[(String, String)], response: &HttpResponse) {
        if !response.is_success() {
            return;
        }

        let entry = CacheEntry {
            stored_at: Utc::now(),
            response: response.clone(),
        };
        let path = self.entry_path(url, query);

        let result = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            let bytes = serde_json::to_vec(&entry)?;
            tokio::fs::write(&path, bytes).await?;
            Ok::<_, crate::error::Error>(())
        }
        .await;

        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to write cache entry");
        }
    }
}
