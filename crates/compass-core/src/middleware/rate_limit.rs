//! Sliding-window request rate limiting
//!
//! One counter per client identity, created with a TTL equal to the
//! window; the window slides implicitly when the key expires. The
//! limiter fails open: if the cache tier is down, requests pass.

use compass_cache::CacheFacade;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

const RATELIMIT_NS: &str = "ratelimit:";

/// Outcome of a rate-limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request may proceed
    Allowed {
        /// Requests left in the current window
        remaining: u32,
    },
    /// Over budget: reject with 429 and back-off metadata
    Rejected {
        limit: u32,
        current: u32,
        reset_after: Duration,
    },
}

impl RateLimitDecision {
    /// True when the request may proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// HTTP status the edge should respond with on rejection
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Allowed { .. } => None,
            Self::Rejected { .. } => Some(429),
        }
    }

    /// Response headers describing the limit state, for both outcomes
    pub fn headers(&self, limit: u32) -> Vec<(String, String)> {
        match self {
            Self::Allowed { remaining } => vec![
                ("X-RateLimit-Limit".to_string(), limit.to_string()),
                ("X-RateLimit-Remaining".to_string(), remaining.to_string()),
            ],
            Self::Rejected {
                limit,
                current,
                reset_after,
            } => vec![
                ("X-RateLimit-Limit".to_string(), limit.to_string()),
                ("X-RateLimit-Remaining".to_string(), "0".to_string()),
                ("X-RateLimit-Current".to_string(), current.to_string()),
                (
                    "X-RateLimit-Reset".to_string(),
                    reset_after.as_secs().to_string(),
                ),
            ],
        }
    }
}

/// Derive a rate-limit identity from a client address and, when present,
/// a fragment of the caller's auth token. The token is hashed so secrets
/// never appear in cache keys.
pub fn client_identity(addr: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            format!("{}:{:08x}", addr, hasher.finish() as u32)
        }
        None => addr.to_string(),
    }
}

/// Per-client sliding-window limiter over the cache tier
#[derive(Debug, Clone)]
pub struct RateLimiter {
    cache: CacheFacade,
}

impl RateLimiter {
    /// Create a limiter over a cache facade
    pub fn new(cache: CacheFacade) -> Self {
        Self { cache }
    }

    /// Count a request for `identity` against `max_requests` per `window`.
    pub async fn check(
        &self,
        identity: &str,
        max_requests: u32,
        window: Duration,
    ) -> RateLimitDecision {
        let key = format!("{}{}", RATELIMIT_NS, identity);

        let current = match self.cache.incr_by(&key, 1, Some(window)).await {
            Ok(value) => value,
            Err(err) => {
                // Fail open: a cache outage must not reject traffic.
                tracing::warn!(identity, error = %err, "rate limiter unavailable, allowing request");
                return RateLimitDecision::Allowed {
                    remaining: max_requests.saturating_sub(1),
                };
            }
        };

        if current > max_requests as i64 {
            let reset_after = match self.cache.ttl(&key).await {
                Ok(Some(remaining)) => remaining,
                _ => window,
            };
            tracing::debug!(identity, current, limit = max_requests, "rate limit exceeded");
            return RateLimitDecision::Rejected {
                limit: max_requests,
                current: current.min(u32::MAX as i64) as u32,
                reset_after,
            };
        }

        RateLimitDecision::Allowed {
            remaining: max_requests.saturating_sub(current as u32),
        }
    }
}
