//! HTTP module
//!
//! Provides the transport primitive, rate limiting, response caching,
//! and the retry/backoff policy.
//!
//! # Features
//!
//! - **Transport**: `GET(url, query) -> (status, headers, body)` behind a trait
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Response Cache**: Optional on-disk cache keyed by request signature
//! - **Retry Policy**: Exponential backoff, `Retry-After` aware

mod cache;
mod client;
mod rate_limit;
mod retry;

pub use cache::ResponseCache;
pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, HttpResponse, Transport};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use retry::RetryPolicy;
