//! Request middleware layer
//!
//! Framework-agnostic pieces an HTTP edge composes in front of business
//! logic: rate limiting, session validation, response caching and usage
//! tracking. Each piece returns a decision value carrying the status code
//! and headers the edge should emit; no web framework types leak in here.
//!
//! Failure policy is availability-first: a cache outage must not become a
//! service outage, so the rate limiter fails open and the response cache
//! degrades to a miss.

mod rate_limit;
mod response_cache;
mod session_guard;
#[cfg(test)]
mod tests;
mod usage;

pub use rate_limit::{client_identity, RateLimitDecision, RateLimiter};
pub use response_cache::{CachedResponse, RequestSignature, ResponseCache};
pub use session_guard::{SessionGuard, SessionValidation, TokenVerifier};
pub use usage::{ApiUsageRecord, UsageTracker};
