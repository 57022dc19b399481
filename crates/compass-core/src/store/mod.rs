//! Durable store interface
//!
//! Row-oriented insert/update/select/upsert API over the three tables the
//! state layer touches. The store is an external collaborator reachable
//! over a network API; this module defines the trait boundary plus a REST
//! backend and an in-memory backend for tests and local runs.
//!
//! Every write here is a complete, self-consistent update to its own
//! tier: message inserts are independent rows, so concurrent appends are
//! already safe on this side of the boundary.

mod memory;
mod rest;
mod types;

pub use memory::MemoryBackend;
pub use rest::{RestStore, RestStoreConfig};
pub use types::{ConversationRow, FeedbackRow, MessageRow, StoreError, StoreResult};

use async_trait::async_trait;

/// Durable store operations.
///
/// Upserts are idempotent and keyed by entity id so `reconcile` can be
/// called redundantly.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Insert a new conversation row
    async fn insert_conversation(&self, row: &ConversationRow) -> StoreResult<()>;

    /// Insert-or-replace a conversation row keyed by id
    async fn upsert_conversation(&self, row: &ConversationRow) -> StoreResult<()>;

    /// Update mutable conversation fields (status, count, updated_at)
    async fn update_conversation(&self, row: &ConversationRow) -> StoreResult<()>;

    /// Fetch a conversation row by id
    async fn get_conversation(&self, id: &str) -> StoreResult<Option<ConversationRow>>;

    /// Insert a single message row (append-only)
    async fn insert_message(&self, row: &MessageRow) -> StoreResult<()>;

    /// Insert-or-replace a message row keyed by id
    async fn upsert_message(&self, row: &MessageRow) -> StoreResult<()>;

    /// All messages for a conversation, ordered by creation time
    async fn messages_for(&self, conversation_id: &str) -> StoreResult<Vec<MessageRow>>;

    /// Insert a feedback row (write-once)
    async fn insert_feedback(&self, row: &FeedbackRow) -> StoreResult<()>;
}
