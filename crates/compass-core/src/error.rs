//! Error types for the Compass state layer
//!
//! Taxonomy (and who handles what):
//! - transport failures talking to either store are caught, logged and
//!   converted to typed results, never left to crash a request handler
//! - absence of a conversation/session/key is `Ok(None)`, not an error
//! - validation failures (appending to a missing conversation) are typed
//!   so the caller decides how to surface them
//! - durable-write failures are a distinct condition: the fast tier may
//!   already hold the record, so the caller learns "created but not yet
//!   durably recorded" rather than a generic failure

use crate::store::StoreError;
use compass_cache::CacheError;
use thiserror::Error;

/// Result type alias for state-layer operations
pub type CompassResult<T> = Result<T, CompassError>;

/// State-layer error type
#[derive(Debug, Error)]
pub enum CompassError {
    /// The referenced conversation does not exist in either tier
    #[error("Conversation not found: {0}")]
    NotFound(String),

    /// Append attempted after the terminal `completed` status
    #[error("Conversation is closed: {0}")]
    ConversationClosed(String),

    /// Cache-tier failure that a caller chose not to absorb
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Durable-store read failure
    #[error("Durable store error: {0}")]
    Store(#[from] StoreError),

    /// Durable write failed after the cache write went through. The
    /// entity exists in the fast tier but is not yet durably recorded;
    /// `reconcile` can force convergence later.
    #[error("Durable write failed for {entity} {id}: {source}")]
    DurableWrite {
        entity: &'static str,
        id: String,
        #[source]
        source: StoreError,
    },

    /// Caller-supplied input failed validation
    #[error("Validation error: {0}")]
    Validation(String),
}

impl CompassError {
    /// True for failures of the durable tier (surfaced per policy)
    pub fn is_durable_failure(&self) -> bool {
        matches!(self, Self::Store(_) | Self::DurableWrite { .. })
    }
}
