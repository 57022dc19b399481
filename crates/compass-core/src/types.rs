//! Conversation data model
//!
//! Defines the core types the state layer moves between tiers:
//! - Conversation: lifecycle status plus an append-only message log
//! - Message: immutable once appended
//! - Feedback: write-once judgment on a specific assistant message
//!
//! Conversation ids are UUIDv7 so they sort by creation time; message and
//! feedback ids only need uniqueness and use v4.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// System prompt or annotation
    System,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Conversation category (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversationCategory {
    General,
    CareerGuidance,
    JobSearch,
    ResumeAnalysis,
    SkillDevelopment,
    Recommendations,
}

impl Default for ConversationCategory {
    fn default() -> Self {
        Self::General
    }
}

/// Conversation lifecycle status. `Completed` is terminal; there is no
/// transition back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Completed,
}

/// Feedback kind for model-improvement pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Helpful,
    NotHelpful,
    Correction,
    Flag,
}

/// Individual conversation message. Immutable once appended: messages are
/// never edited or deleted, only added to the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique within the parent conversation
    pub id: String,

    /// Message role
    pub role: MessageRole,

    /// Textual content
    pub content: String,

    /// Free-form metadata (model name, token counts, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message with a generated id
    pub fn new(
        role: MessageRole,
        content: impl Into<String>,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// A conversation between a user and the assistant.
///
/// Invariant: `message_count == messages.len()` after any mutation made
/// through this type's methods. The conversation manager is the only
/// writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Time-sortable unique identifier (UUIDv7)
    pub id: String,

    /// Owning user identity (opaque)
    pub user_id: String,

    /// Optional title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Category tag
    pub category: ConversationCategory,

    /// Lifecycle status
    pub status: ConversationStatus,

    /// Ordered message log (append-only)
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Must equal `messages.len()`
    pub message_count: usize,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a fresh, empty conversation in `Active` status
    pub fn new(
        user_id: impl Into<String>,
        category: ConversationCategory,
        title: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            title,
            category,
            status: ConversationStatus::Active,
            messages: Vec::new(),
            message_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// True once the terminal status has been reached
    pub fn is_completed(&self) -> bool {
        self.status == ConversationStatus::Completed
    }

    /// Replace the message log, keeping the count in sync
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.message_count = messages.len();
        self.messages = messages;
    }

    /// Bump the update timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Copy of the metadata without the message log. This is the shape
    /// cached under the meta key; the log lives in its own list key.
    pub fn meta_only(&self) -> Self {
        let mut meta = self.clone();
        meta.messages = Vec::new();
        meta
    }
}

/// Human feedback on a specific assistant message. Write-once; never
/// mutates the message or conversation it references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub user_id: String,
    pub kind: FeedbackKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Feedback {
    /// Create a feedback record with a generated id
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conversation_id: impl Into<String>,
        message_id: impl Into<String>,
        user_id: impl Into<String>,
        kind: FeedbackKind,
        rating: Option<u8>,
        comment: Option<String>,
        correction: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            message_id: message_id.into(),
            user_id: user_id.into(),
            kind,
            rating,
            comment,
            correction,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation_is_active_and_empty() {
        let conv = Conversation::new("u-1", ConversationCategory::CareerGuidance, None);
        assert_eq!(conv.status, ConversationStatus::Active);
        assert!(conv.messages.is_empty());
        assert_eq!(conv.message_count, 0);
        assert!(!conv.is_completed());
    }

    #[test]
    fn test_conversation_ids_are_time_sortable() {
        let a = Conversation::new("u", ConversationCategory::General, None);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = Conversation::new("u", ConversationCategory::General, None);
        assert!(a.id < b.id);
    }

    #[test]
    fn test_set_messages_keeps_count_in_sync() {
        let mut conv = Conversation::new("u", ConversationCategory::General, None);
        conv.set_messages(vec![
            Message::new(MessageRole::User, "hi", None),
            Message::new(MessageRole::Assistant, "hello", None),
        ]);
        assert_eq!(conv.message_count, conv.messages.len());
        assert_eq!(conv.message_count, 2);
    }

    #[test]
    fn test_category_serde_uses_kebab_case() {
        let json = serde_json::to_string(&ConversationCategory::ResumeAnalysis).unwrap();
        assert_eq!(json, "\"resume-analysis\"");
        let parsed: ConversationCategory = serde_json::from_str("\"career-guidance\"").unwrap();
        assert_eq!(parsed, ConversationCategory::CareerGuidance);
    }

    #[test]
    fn test_feedback_kind_serde_uses_snake_case() {
        let json = serde_json::to_string(&FeedbackKind::NotHelpful).unwrap();
        assert_eq!(json, "\"not_helpful\"");
    }

    #[test]
    fn test_meta_only_drops_the_log() {
        let mut conv = Conversation::new("u", ConversationCategory::General, None);
        conv.set_messages(vec![Message::new(MessageRole::User, "hi", None)]);
        let meta = conv.meta_only();
        assert!(meta.messages.is_empty());
        assert_eq!(meta.message_count, 1);
        assert_eq!(meta.id, conv.id);
    }
}
