use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ids are store-local counters, strictly increasing in assignment order.
pub type MessageId = u64;
pub type ConversationId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Audio,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: String,
    pub sender_id: String,
    /// Text payload; for audio/image messages this is a display placeholder.
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
    /// Elapsed seconds, present on audio messages only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
}

/// What a caller supplies to `append`. The store assigns `id` and
/// `timestamp` itself, so client-supplied values are unrepresentable
/// here rather than silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDraft {
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
}

impl MessageDraft {
    pub fn text(chat_id: impl Into<String>, sender_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
            kind: MessageKind::Text,
            duration_secs: None,
        }
    }
}

/// Merge-patch for `update`. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub is_read: Option<bool>,
}

/// Denormalized copy of the most recent message of a conversation,
/// maintained by the writer on every append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSnapshot {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    pub sender_id: String,
}

impl From<&Message> for MessageSnapshot {
    fn from(m: &Message) -> Self {
        Self {
            content: m.content.clone(),
            kind: m.kind,
            timestamp: m.timestamp,
            sender_id: m.sender_id.clone(),
        }
    }
}

/// Aggregate summary of all messages sharing a `chat_id`. Exactly one
/// exists per distinct chat id seen by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub chat_id: String,
    /// The local user and the counterpart, in that order.
    pub participants: [String; 2],
    pub last_message: Option<MessageSnapshot>,
    pub is_read: bool,
    pub unread_count: u32,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// The participant that is not the local user.
    pub fn counterpart(&self) -> &str {
        &self.participants[1]
    }
}

/// Identity of the local user, threaded explicitly into every operation
/// that needs it instead of a hardcoded constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into() }
    }
}
