//! Conversation manager operations

use crate::error::{CompassError, CompassResult};
use crate::store::{ConversationRow, DurableStore, FeedbackRow, MessageRow};
use crate::types::{
    Conversation, ConversationCategory, ConversationStatus, Feedback, FeedbackKind, Message,
    MessageRole,
};
use compass_cache::CacheFacade;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Conversation manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Cache lifetime for conversation meta and message log
    #[serde(with = "humantime_serde")]
    pub conversation_ttl: Duration,
    /// Cache lifetime for feedback entries (operational visibility only)
    #[serde(with = "humantime_serde")]
    pub feedback_ttl: Duration,
    /// `cleanup_expired_conversations` deletes entries with less
    /// remaining TTL than this floor
    #[serde(with = "humantime_serde")]
    pub cleanup_floor: Duration,
    /// Gate appends once a conversation is completed. Off, trailing
    /// system messages are accepted after completion.
    pub reject_after_completion: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            conversation_ttl: Duration::from_secs(7 * 24 * 3600),
            feedback_ttl: Duration::from_secs(24 * 3600),
            cleanup_floor: Duration::from_secs(3600),
            reject_after_completion: true,
        }
    }
}

const CONVERSATION_NS: &str = "conversation:";

/// Owner of the conversation lifecycle across both storage tiers.
///
/// The only writer of conversation state; request handlers share one
/// instance behind an `Arc`, injected at process startup.
#[derive(Clone)]
pub struct ConversationManager {
    cache: CacheFacade,
    store: Arc<dyn DurableStore>,
    config: ConversationConfig,
}

impl std::fmt::Debug for ConversationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn meta_key(id: &str) -> String {
    format!("{}{}", CONVERSATION_NS, id)
}

fn log_key(id: &str) -> String {
    format!("{}{}:messages", CONVERSATION_NS, id)
}

impl ConversationManager {
    /// Create a manager over an injected cache facade and durable store
    pub fn new(
        cache: CacheFacade,
        store: Arc<dyn DurableStore>,
        config: ConversationConfig,
    ) -> Self {
        Self {
            cache,
            store,
            config,
        }
    }

    /// The active configuration
    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// Create a conversation: cache entry with a multi-day TTL plus a
    /// synchronous durable metadata insert.
    ///
    /// A durable failure surfaces as [`CompassError::DurableWrite`]; the
    /// cache entry is deliberately not rolled back (the durable store is
    /// the source of truth for listing, the cache is convenience).
    pub async fn create_conversation(
        &self,
        user_id: &str,
        category: ConversationCategory,
        title: Option<String>,
    ) -> CompassResult<String> {
        let conversation = Conversation::new(user_id, category, title);
        let id = conversation.id.clone();

        self.cache_meta(&conversation).await;

        self.store
            .insert_conversation(&ConversationRow::from(&conversation))
            .await
            .map_err(|source| CompassError::DurableWrite {
                entity: "conversation",
                id: id.clone(),
                source,
            })?;

        tracing::debug!(conversation_id = %id, user_id, "conversation created");
        Ok(id)
    }

    /// Cache-first, store-fallback read.
    ///
    /// On a cache miss the conversation is reassembled from the durable
    /// rows and written back with a fresh TTL so the next read hits the
    /// fast path. Write-back failures never fail the read.
    pub async fn get_conversation(&self, id: &str) -> CompassResult<Option<Conversation>> {
        if let Some(conversation) = self.read_from_cache(id).await {
            tracing::debug!(conversation_id = %id, "conversation cache hit");
            return Ok(Some(conversation));
        }

        let Some(conversation) = self.read_from_store(id).await? else {
            return Ok(None);
        };

        self.write_back(&conversation).await;
        Ok(Some(conversation))
    }

    /// Message log for a conversation, ordered by append time
    pub async fn get_conversation_messages(&self, id: &str) -> CompassResult<Vec<Message>> {
        match self.get_conversation(id).await? {
            Some(conversation) => Ok(conversation.messages),
            None => Err(CompassError::NotFound(id.to_string())),
        }
    }

    /// Append a message to a conversation's log.
    ///
    /// The cache append is the store's atomic list push, so concurrent
    /// appenders never overwrite each other. The cached meta blob is
    /// rewritten afterwards; readers recompute `message_count` from the
    /// list itself, so a stale meta count is harmless.
    pub async fn add_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: impl Into<String>,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) -> CompassResult<String> {
        let mut conversation = self
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| CompassError::NotFound(conversation_id.to_string()))?;

        if conversation.is_completed() && self.config.reject_after_completion {
            return Err(CompassError::ConversationClosed(
                conversation_id.to_string(),
            ));
        }

        let message = Message::new(role, content, metadata);
        let ttl = self.config.conversation_ttl;

        let new_count = match self
            .cache
            .push(&log_key(conversation_id), &message, Some(ttl))
            .await
        {
            Ok(len) => {
                // Keep both keys alive together.
                let _ = self.cache.expire(&log_key(conversation_id), ttl).await;
                let _ = self.cache.expire(&meta_key(conversation_id), ttl).await;
                len as usize
            }
            Err(err) => {
                tracing::warn!(conversation_id, error = %err, "cache append failed, durable insert proceeds");
                conversation.message_count + 1
            }
        };

        conversation.message_count = new_count;
        conversation.touch();
        self.cache_meta(&conversation).await;

        self.store
            .insert_message(&MessageRow::from_message(conversation_id, &message))
            .await
            .map_err(|source| CompassError::DurableWrite {
                entity: "message",
                id: message.id.clone(),
                source,
            })?;

        // Count drift on the durable row is derived data; reconcile
        // repairs it, so a failure here only warrants a warning.
        if let Err(err) = self
            .store
            .update_conversation(&ConversationRow::from(&conversation))
            .await
        {
            tracing::warn!(conversation_id, error = %err, "conversation row update failed");
        }

        Ok(message.id)
    }

    /// Record human feedback on a message. The 1-day cache entry and the
    /// durable analytics insert are independent; neither gates the other.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_feedback(
        &self,
        conversation_id: &str,
        message_id: &str,
        user_id: &str,
        kind: FeedbackKind,
        rating: Option<u8>,
        comment: Option<String>,
        correction: Option<String>,
    ) -> CompassResult<String> {
        let feedback = Feedback::new(
            conversation_id,
            message_id,
            user_id,
            kind,
            rating,
            comment,
            correction,
        );

        if let Err(err) = self
            .cache
            .set(
                &format!("feedback:{}", feedback.id),
                &feedback,
                Some(self.config.feedback_ttl),
            )
            .await
        {
            tracing::warn!(feedback_id = %feedback.id, error = %err, "feedback cache write failed");
        }

        self.store
            .insert_feedback(&FeedbackRow::from(&feedback))
            .await
            .map_err(|source| CompassError::DurableWrite {
                entity: "feedback",
                id: feedback.id.clone(),
                source,
            })?;

        Ok(feedback.id)
    }

    /// Transition a conversation to the terminal `completed` status in
    /// both tiers. Idempotent: repeating the call leaves the same state.
    pub async fn complete_conversation(&self, id: &str) -> CompassResult<()> {
        let mut conversation = self
            .get_conversation(id)
            .await?
            .ok_or_else(|| CompassError::NotFound(id.to_string()))?;

        if !conversation.is_completed() {
            conversation.status = ConversationStatus::Completed;
            conversation.touch();
        }

        self.cache_meta(&conversation).await;

        self.store
            .update_conversation(&ConversationRow::from(&conversation))
            .await
            .map_err(|source| CompassError::DurableWrite {
                entity: "conversation",
                id: id.to_string(),
                source,
            })?;

        Ok(())
    }

    /// Force-push the cache's view of a conversation into the durable
    /// store. Upserts keyed by id make this safe to call redundantly;
    /// it exists because the cache is the fast path for mutation and the
    /// durable tier can lag.
    pub async fn reconcile(&self, id: &str) -> CompassResult<()> {
        let Some(conversation) = self.read_from_cache(id).await else {
            tracing::debug!(conversation_id = %id, "nothing cached to reconcile");
            return Ok(());
        };

        self.store
            .upsert_conversation(&ConversationRow::from(&conversation))
            .await?;
        for message in &conversation.messages {
            self.store
                .upsert_message(&MessageRow::from_message(id, message))
                .await?;
        }

        tracing::debug!(
            conversation_id = %id,
            messages = conversation.messages.len(),
            "reconciled conversation to durable store"
        );
        Ok(())
    }

    /// Maintenance sweep: delete conversation cache keys whose remaining
    /// TTL is below the configured floor. The store expires entries on
    /// its own; this only bounds the live key count under load. Returns
    /// the number of keys removed.
    pub async fn cleanup_expired_conversations(&self) -> CompassResult<usize> {
        let keys = self.cache.keys_under(CONVERSATION_NS).await?;
        let mut removed = 0;

        for key in keys {
            match self.cache.ttl(&key).await {
                Ok(Some(remaining)) if remaining < self.config.cleanup_floor => {
                    match self.cache.delete(&key).await {
                        Ok(true) => removed += 1,
                        Ok(false) => {}
                        Err(err) => {
                            tracing::warn!(key, error = %err, "cleanup delete failed")
                        }
                    }
                }
                Ok(_) => {}
                // Enumeration can be stale; skip keys that misbehave.
                Err(err) => tracing::warn!(key, error = %err, "cleanup ttl probe failed"),
            }
        }

        tracing::debug!(removed, "conversation cache sweep finished");
        Ok(removed)
    }

    /// Cache the meta blob (no message log) with a fresh TTL. Cache
    /// failures are absorbed: the durable tier stays correct without it.
    async fn cache_meta(&self, conversation: &Conversation) {
        if let Err(err) = self
            .cache
            .set(
                &meta_key(&conversation.id),
                &conversation.meta_only(),
                Some(self.config.conversation_ttl),
            )
            .await
        {
            tracing::warn!(conversation_id = %conversation.id, error = %err, "conversation meta cache write failed");
        }
    }

    /// Fast-path read: meta key plus message list. Any failure or skew
    /// (meta present, log missing) degrades to a miss.
    async fn read_from_cache(&self, id: &str) -> Option<Conversation> {
        let mut conversation = match self.cache.get::<Conversation>(&meta_key(id)).await {
            Ok(Some(meta)) => meta,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(conversation_id = %id, error = %err, "conversation cache read failed");
                return None;
            }
        };

        let values = match self.cache.range(&log_key(id), 0, -1).await {
            Ok(values) => values,
            Err(err) => {
                tracing::warn!(conversation_id = %id, error = %err, "message log cache read failed");
                return None;
            }
        };
        let values_len = values.len();

        let mut messages = Vec::with_capacity(values.len());
        let mut seen = HashSet::with_capacity(values.len());
        for value in values {
            match serde_json::from_value::<Message>(value) {
                Ok(message) => {
                    // Racing write-backs can replay the log; first
                    // occurrence of each id wins.
                    if seen.insert(message.id.clone()) {
                        messages.push(message);
                    }
                }
                // A single bad entry poisons the log view; fall back.
                Err(err) => {
                    tracing::warn!(conversation_id = %id, error = %err, "undecodable cached message");
                    return None;
                }
            }
        }
        if messages.len() < values_len {
            tracing::warn!(
                conversation_id = %id,
                served = messages.len(),
                cached = values_len,
                "duplicated entries in cached message log"
            );
        }

        // The meta key can outlive the log key (or the reverse), and a
        // write-back may still be replaying the log; a log shorter than
        // the recorded count is served from the durable tier.
        if messages.len() < conversation.message_count {
            return None;
        }

        conversation.set_messages(messages);
        Some(conversation)
    }

    /// Cold-path read from the durable rows
    async fn read_from_store(&self, id: &str) -> CompassResult<Option<Conversation>> {
        let Some(row) = self.store.get_conversation(id).await? else {
            return Ok(None);
        };

        let rows = self.store.messages_for(id).await?;
        let mut conversation = row.into_conversation();
        conversation.set_messages(rows.into_iter().map(MessageRow::into_message).collect());
        Ok(Some(conversation))
    }

    /// Populate the cache after a fallback read. Only fills an empty log
    /// key so a message appended mid-fallback is never clobbered. Two
    /// racing fallbacks can still both observe the empty log and both
    /// replay it; `read_from_cache` deduplicates by message id, so the
    /// duplicates are never served.
    async fn write_back(&self, conversation: &Conversation) {
        self.cache_meta(conversation).await;

        let key = log_key(&conversation.id);
        match self.cache.list_len(&key).await {
            Ok(0) => {
                for message in &conversation.messages {
                    if let Err(err) = self
                        .cache
                        .push(&key, message, Some(self.config.conversation_ttl))
                        .await
                    {
                        tracing::warn!(conversation_id = %conversation.id, error = %err, "message log write-back failed");
                        return;
                    }
                }
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(conversation_id = %conversation.id, error = %err, "message log probe failed");
            }
        }
    }
}
