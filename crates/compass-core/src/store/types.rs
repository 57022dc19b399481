//! Durable store row types and errors
//!
//! Rows mirror the three tables the layer reads and writes:
//! conversations, messages, feedback. Conversion to and from the domain
//! types is lossless for the fields this layer owns; the conversations
//! table never carries the message log itself.

use crate::types::{
    Conversation, ConversationCategory, ConversationStatus, Feedback, FeedbackKind, Message,
    MessageRole,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Durable store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Store returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias for durable store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Connection(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Row in the conversations table (metadata only, no messages)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRow {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub category: ConversationCategory,
    pub status: ConversationStatus,
    pub message_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Conversation> for ConversationRow {
    fn from(conv: &Conversation) -> Self {
        Self {
            id: conv.id.clone(),
            user_id: conv.user_id.clone(),
            title: conv.title.clone(),
            category: conv.category,
            status: conv.status,
            message_count: conv.message_count as i64,
            created_at: conv.created_at,
            updated_at: conv.updated_at,
        }
    }
}

impl ConversationRow {
    /// Rebuild the domain type with an empty message log
    pub fn into_conversation(self) -> Conversation {
        Conversation {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            category: self.category,
            status: self.status,
            messages: Vec::new(),
            message_count: self.message_count.max(0) as usize,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Row in the messages table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl MessageRow {
    /// Build a row from a message and its parent conversation id
    pub fn from_message(conversation_id: &str, message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            conversation_id: conversation_id.to_string(),
            role: message.role,
            content: message.content.clone(),
            metadata: message
                .metadata
                .as_ref()
                .and_then(|m| serde_json::to_value(m).ok()),
            created_at: message.created_at,
        }
    }

    /// Rebuild the domain message
    pub fn into_message(self) -> Message {
        Message {
            id: self.id,
            role: self.role,
            content: self.content,
            metadata: self
                .metadata
                .and_then(|v| serde_json::from_value(v).ok()),
            created_at: self.created_at,
        }
    }
}

/// Row in the feedback table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRow {
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

impl From<&Feedback> for FeedbackRow {
    fn from(fb: &Feedback) -> Self {
        Self {
            id: fb.id.clone(),
            conversation_id: fb.conversation_id.clone(),
            message_id: fb.message_id.clone(),
            user_id: fb.user_id.clone(),
            kind: fb.kind,
            rating: fb.rating,
            comment: fb.comment.clone(),
            correction: fb.correction.clone(),
            created_at: fb.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Conversation, Message};

    #[test]
    fn test_conversation_row_roundtrip() {
        let mut conv = Conversation::new("u-1", ConversationCategory::JobSearch, None);
        conv.set_messages(vec![Message::new(MessageRole::User, "hi", None)]);

        let row = ConversationRow::from(&conv);
        assert_eq!(row.message_count, 1);

        let rebuilt = row.into_conversation();
        assert_eq!(rebuilt.id, conv.id);
        assert_eq!(rebuilt.message_count, 1);
        // The table never holds the log itself.
        assert!(rebuilt.messages.is_empty());
    }

    #[test]
    fn test_message_row_roundtrip_with_metadata() {
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("model".to_string(), serde_json::json!("sonnet"));
        let message = Message::new(MessageRole::Assistant, "answer", Some(metadata));

        let row = MessageRow::from_message("conv-1", &message);
        assert_eq!(row.conversation_id, "conv-1");

        let rebuilt = row.into_message();
        assert_eq!(rebuilt.id, message.id);
        assert_eq!(rebuilt.content, "answer");
        assert_eq!(
            rebuilt.metadata.unwrap().get("model"),
            Some(&serde_json::json!("sonnet"))
        );
    }
}
