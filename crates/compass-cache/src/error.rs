//! Cache-tier error types
//!
//! Cache failures are an availability problem, not a correctness problem:
//! callers are expected to treat any `CacheError` as a cache miss and fall
//! back to the durable tier. Nothing in this module should ever be allowed
//! to crash a request handler.

use thiserror::Error;

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-tier error types
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unexpected value type for key {key}: expected {expected}")]
    WrongType { key: String, expected: &'static str },
}

impl CacheError {
    /// True when the failure came from the store or the network rather
    /// than from the caller's input. These are the failures the fail-soft
    /// policies absorb.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Transport(_) | Self::Timeout(_)
        )
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() {
            Self::Connection(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
