//! In-memory durable store backend
//!
//! HashMap-backed implementation used by tests and local development.
//! Tracks read/write counts so tests can assert which tier actually
//! served a request (the write-back property depends on it).

use super::types::{ConversationRow, FeedbackRow, MessageRow, StoreError, StoreResult};
use super::DurableStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Backend access counters
#[derive(Debug, Default, Clone, Copy)]
pub struct StoreStats {
    pub reads: u64,
    pub writes: u64,
}

/// In-memory [`DurableStore`] implementation
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    conversations: Arc<Mutex<HashMap<String, ConversationRow>>>,
    messages: Arc<Mutex<Vec<MessageRow>>>,
    feedback: Arc<Mutex<Vec<FeedbackRow>>>,
    stats: Arc<Mutex<StoreStats>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Access counters (for tests asserting tier behavior)
    pub async fn stats(&self) -> StoreStats {
        *self.stats.lock().await
    }

    /// Total durably recorded messages for a conversation
    pub async fn message_count(&self, conversation_id: &str) -> usize {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .count()
    }

    /// All feedback rows recorded so far
    pub async fn feedback_rows(&self) -> Vec<FeedbackRow> {
        self.feedback.lock().await.clone()
    }

    async fn count_write(&self) {
        self.stats.lock().await.writes += 1;
    }

    async fn count_read(&self) {
        self.stats.lock().await.reads += 1;
    }
}

#[async_trait]
impl DurableStore for MemoryBackend {
    async fn insert_conversation(&self, row: &ConversationRow) -> StoreResult<()> {
        self.count_write().await;
        self.conversations
            .lock()
            .await
            .insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn upsert_conversation(&self, row: &ConversationRow) -> StoreResult<()> {
        self.insert_conversation(row).await
    }

    async fn update_conversation(&self, row: &ConversationRow) -> StoreResult<()> {
        self.count_write().await;
        let mut conversations = self.conversations.lock().await;
        match conversations.get_mut(&row.id) {
            Some(existing) => {
                existing.status = row.status;
                existing.message_count = row.message_count;
                existing.updated_at = row.updated_at;
                existing.title = row.title.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(row.id.clone())),
        }
    }

    async fn get_conversation(&self, id: &str) -> StoreResult<Option<ConversationRow>> {
        self.count_read().await;
        Ok(self.conversations.lock().await.get(id).cloned())
    }

    async fn insert_message(&self, row: &MessageRow) -> StoreResult<()> {
        self.count_write().await;
        self.messages.lock().await.push(row.clone());
        Ok(())
    }

    async fn upsert_message(&self, row: &MessageRow) -> StoreResult<()> {
        self.count_write().await;
        let mut messages = self.messages.lock().await;
        match messages.iter_mut().find(|m| m.id == row.id) {
            Some(existing) => *existing = row.clone(),
            None => messages.push(row.clone()),
        }
        Ok(())
    }

    async fn messages_for(&self, conversation_id: &str) -> StoreResult<Vec<MessageRow>> {
        self.count_read().await;
        let mut rows: Vec<MessageRow> = self
            .messages
            .lock()
            .await
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn insert_feedback(&self, row: &FeedbackRow) -> StoreResult<()> {
        self.count_write().await;
        self.feedback.lock().await.push(row.clone());
        Ok(())
    }
}
