//! Compass conversation/session state layer
//!
//! The domain tier of the two-tier state subsystem:
//! - Conversation data model (conversations, messages, feedback)
//! - Durable store interface (row-oriented, REST and in-memory backends)
//! - Conversation manager: cache-first/store-fallback reads, atomic
//!   message appends, feedback capture, reconciliation
//! - Request middleware: rate limiting, session validation, response
//!   caching and usage tracking
//!
//! The fast tier lives in the `compass-cache` crate; both stores are
//! injected handles owned by the process entry point, never globals.

pub mod conversation;
pub mod error;
pub mod middleware;
pub mod store;
pub mod types;

pub use conversation::{ConversationConfig, ConversationManager};
pub use error::{CompassError, CompassResult};
pub use middleware::{
    client_identity, ApiUsageRecord, CachedResponse, RateLimitDecision, RateLimiter,
    RequestSignature, ResponseCache, SessionGuard, SessionValidation, TokenVerifier,
    UsageTracker,
};
pub use store::{
    ConversationRow, DurableStore, FeedbackRow, MemoryBackend, MessageRow, RestStore,
    RestStoreConfig, StoreError, StoreResult,
};
pub use types::{
    Conversation, ConversationCategory, ConversationStatus, Feedback, FeedbackKind, Message,
    MessageRole,
};
