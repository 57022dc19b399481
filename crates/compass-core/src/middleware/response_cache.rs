//! Generic response caching
//!
//! Responses are keyed by a canonicalized request signature (method,
//! path, query parameters sorted by name then value) or by a
//! caller-supplied key. Hits carry the `X-Cache: HIT` marker the edge
//! forwards to clients. All failures degrade to a miss.

use chrono::{DateTime, Utc};
use compass_cache::CacheFacade;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const RESPONSE_NS: &str = "resp:";

/// Canonical request signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSignature {
    key: String,
}

impl RequestSignature {
    /// Build a signature from method, path and query parameters. The
    /// query is sorted so parameter order never splits the cache.
    pub fn new(method: &str, path: &str, query: &[(String, String)]) -> Self {
        let mut sorted = query.to_vec();
        sorted.sort();
        let query = sorted
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("&");
        Self {
            key: format!("{}:{}?{}", method.to_uppercase(), path, query),
        }
    }

    /// Use a caller-supplied key verbatim
    pub fn from_key(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// The canonical cache key
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// A response served from the cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Full serialized response body
    pub body: Value,
    /// When the entry was written
    pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Marker header for cache-served responses
    pub fn cache_header(&self) -> (String, String) {
        ("X-Cache".to_string(), "HIT".to_string())
    }
}

/// Response cache over the cache tier
#[derive(Debug, Clone)]
pub struct ResponseCache {
    cache: CacheFacade,
}

impl ResponseCache {
    /// Create a response cache over a facade
    pub fn new(cache: CacheFacade) -> Self {
        Self { cache }
    }

    /// Store a response body under the signature for `ttl`. Failures are
    /// absorbed: an uncached response is only a slower next request.
    pub async fn store(&self, signature: &RequestSignature, body: &Value, ttl: Duration) {
        let entry = CachedResponse {
            body: body.clone(),
            cached_at: Utc::now(),
        };
        let key = format!("{}{}", RESPONSE_NS, signature.key());
        if let Err(err) = self.cache.set(&key, &entry, Some(ttl)).await {
            tracing::warn!(key, error = %err, "response cache write failed");
        }
    }

    /// Look up a cached response; every failure degrades to a miss
    pub async fn lookup(&self, signature: &RequestSignature) -> Option<CachedResponse> {
        let key = format!("{}{}", RESPONSE_NS, signature.key());
        match self.cache.get::<CachedResponse>(&key).await {
            Ok(hit) => hit,
            Err(err) => {
                tracing::warn!(key, error = %err, "response cache read failed");
                None
            }
        }
    }
}
