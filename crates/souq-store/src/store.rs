use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use souq_types::ChatError;
use souq_types::models::{
    Conversation, ConversationId, Message, MessageDraft, MessageId, MessagePatch, MessageSnapshot,
    UserContext,
};

use crate::transport::Transport;

/// Authoritative in-memory message store plus the conversation index
/// derived from it. Constructed once at process start and shared as
/// `Arc<ChatStore>`; there is no other copy of this state.
///
/// The index is eagerly denormalized: every append rewrites the owning
/// conversation's `last_message` snapshot, so reads never scan messages.
pub struct ChatStore {
    transport: Arc<dyn Transport>,
    identity: UserContext,
    inner: RwLock<StoreInner>,
}

struct StoreInner {
    messages: Vec<Message>,
    conversations: Vec<Conversation>,
    next_message_id: MessageId,
    next_conversation_id: ConversationId,
}

impl ChatStore {
    pub fn new(transport: Arc<dyn Transport>, identity: UserContext) -> Self {
        Self {
            transport,
            identity,
            inner: RwLock::new(StoreInner {
                messages: Vec::new(),
                conversations: Vec::new(),
                next_message_id: 1,
                next_conversation_id: 1,
            }),
        }
    }

    /// Build a store from fixture messages, deriving one conversation per
    /// distinct chat id. Messages are the single source of truth; there
    /// is no separate conversation fixture.
    pub fn with_seed(
        transport: Arc<dyn Transport>,
        identity: UserContext,
        seed: Vec<Message>,
    ) -> Self {
        let next_message_id = seed.iter().map(|m| m.id).max().unwrap_or(0) + 1;

        // Distinct chat ids in first-seen order.
        let mut chat_order: Vec<&str> = Vec::new();
        for m in &seed {
            if !chat_order.contains(&m.chat_id.as_str()) {
                chat_order.push(&m.chat_id);
            }
        }

        let mut conversations = Vec::with_capacity(chat_order.len());
        for (i, chat_id) in chat_order.iter().enumerate() {
            // Non-empty by construction: every chat id was seen in the seed.
            let group: Vec<&Message> = seed.iter().filter(|m| m.chat_id == *chat_id).collect();
            // Latest by timestamp, ties broken by highest id.
            let Some(last) = group.iter().max_by_key(|m| (m.timestamp, m.id)).copied() else {
                continue;
            };
            let unread = group.iter().filter(|m| !m.is_read).count() as u32;

            conversations.push(Conversation {
                id: i as ConversationId + 1,
                chat_id: (*chat_id).to_string(),
                participants: [identity.user_id.clone(), counterpart_for(chat_id)],
                last_message: Some(MessageSnapshot::from(last)),
                is_read: last.is_read,
                unread_count: unread,
                archived: false,
                created_at: group[0].timestamp,
            });
        }

        info!(
            messages = seed.len(),
            conversations = conversations.len(),
            "chat store seeded"
        );

        let next_conversation_id = conversations.len() as ConversationId + 1;
        Self {
            transport,
            identity,
            inner: RwLock::new(StoreInner {
                messages: seed,
                conversations,
                next_message_id,
                next_conversation_id,
            }),
        }
    }

    pub fn identity(&self) -> &UserContext {
        &self.identity
    }

    /// All messages of a chat, ascending by timestamp, insertion order
    /// preserved for equal timestamps. Unknown chat ids yield an empty
    /// list: a chat with no messages yet is valid, not missing.
    pub async fn messages_for_chat(&self, chat_id: &str) -> Result<Vec<Message>, ChatError> {
        self.transport.round_trip().await?;

        let inner = self.inner.read().await;
        let mut out: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.timestamp);
        Ok(out)
    }

    /// Store a new message. The id and timestamp are assigned here, never
    /// taken from the caller, which is what keeps ids strictly increasing
    /// and per-chat timestamps non-decreasing.
    pub async fn append(&self, draft: MessageDraft) -> Result<Message, ChatError> {
        self.transport.round_trip().await?;

        if draft.chat_id.trim().is_empty() {
            return Err(ChatError::Validation("chat_id is required".into()));
        }
        if draft.sender_id.trim().is_empty() {
            return Err(ChatError::Validation("sender_id is required".into()));
        }
        if draft.content.trim().is_empty() {
            return Err(ChatError::Validation("content is required".into()));
        }

        let mut inner = self.inner.write().await;
        let message = Message {
            id: inner.next_message_id,
            chat_id: draft.chat_id,
            sender_id: draft.sender_id,
            content: draft.content,
            kind: draft.kind,
            timestamp: Utc::now(),
            is_read: false,
            duration_secs: draft.duration_secs,
        };
        inner.next_message_id += 1;
        inner.messages.push(message.clone());

        self.sync_index(&mut inner, &message);

        debug!(id = message.id, chat = %message.chat_id, "message appended");
        Ok(message)
    }

    /// Keep the one-conversation-per-chat invariant and the
    /// `last_message` snapshot current. Every append flips the
    /// conversation unread, own messages included; matches the shipped
    /// behavior; see the pinned test before changing it.
    fn sync_index(&self, inner: &mut StoreInner, message: &Message) {
        if let Some(conv) = inner
            .conversations
            .iter_mut()
            .find(|c| c.chat_id == message.chat_id)
        {
            conv.last_message = Some(MessageSnapshot::from(message));
            conv.is_read = false;
            conv.unread_count += 1;
        } else {
            let conv = Conversation {
                id: inner.next_conversation_id,
                chat_id: message.chat_id.clone(),
                participants: [
                    self.identity.user_id.clone(),
                    counterpart_for(&message.chat_id),
                ],
                last_message: Some(MessageSnapshot::from(message)),
                is_read: false,
                unread_count: 1,
                archived: false,
                created_at: message.timestamp,
            };
            debug!(chat = %conv.chat_id, id = conv.id, "conversation created");
            inner.next_conversation_id += 1;
            inner.conversations.push(conv);
        }
    }

    /// Merge a patch onto an existing message. The store is untouched on
    /// `NotFound`.
    pub async fn update(&self, id: MessageId, patch: MessagePatch) -> Result<Message, ChatError> {
        self.transport.round_trip().await?;

        let mut inner = self.inner.write().await;
        let Some(message) = inner.messages.iter_mut().find(|m| m.id == id) else {
            warn!(id, "update on missing message");
            return Err(ChatError::not_found(format!("message {id}")));
        };

        if let Some(content) = patch.content {
            message.content = content;
        }
        if let Some(is_read) = patch.is_read {
            message.is_read = is_read;
        }
        Ok(message.clone())
    }

    /// Delete a message and return it. The owning conversation persists;
    /// its `last_message` is recomputed from what remains, or cleared
    /// when the chat is emptied.
    pub async fn remove(&self, id: MessageId) -> Result<Message, ChatError> {
        self.transport.round_trip().await?;

        let mut inner = self.inner.write().await;
        let Some(pos) = inner.messages.iter().position(|m| m.id == id) else {
            warn!(id, "remove on missing message");
            return Err(ChatError::not_found(format!("message {id}")));
        };
        let removed = inner.messages.remove(pos);

        let last = inner
            .messages
            .iter()
            .filter(|m| m.chat_id == removed.chat_id)
            .max_by_key(|m| (m.timestamp, m.id))
            .map(MessageSnapshot::from);
        let unread = inner
            .messages
            .iter()
            .filter(|m| m.chat_id == removed.chat_id && !m.is_read)
            .count() as u32;
        if let Some(conv) = inner
            .conversations
            .iter_mut()
            .find(|c| c.chat_id == removed.chat_id)
        {
            conv.last_message = last;
            conv.unread_count = unread;
        }

        debug!(id, chat = %removed.chat_id, "message removed");
        Ok(removed)
    }

    /// All conversations, in conversation-id order.
    pub async fn conversations(&self) -> Result<Vec<Conversation>, ChatError> {
        self.transport.round_trip().await?;
        Ok(self.inner.read().await.conversations.clone())
    }

    pub async fn conversation_for_chat(
        &self,
        chat_id: &str,
    ) -> Result<Option<Conversation>, ChatError> {
        self.transport.round_trip().await?;
        Ok(self
            .inner
            .read()
            .await
            .conversations
            .iter()
            .find(|c| c.chat_id == chat_id)
            .cloned())
    }

    /// Mark a whole conversation read: the summary flags and every
    /// message in the chat.
    pub async fn mark_read(&self, chat_id: &str) -> Result<Conversation, ChatError> {
        self.transport.round_trip().await?;

        let mut inner = self.inner.write().await;
        for m in inner.messages.iter_mut().filter(|m| m.chat_id == chat_id) {
            m.is_read = true;
        }
        let Some(conv) = inner
            .conversations
            .iter_mut()
            .find(|c| c.chat_id == chat_id)
        else {
            return Err(ChatError::not_found(format!("conversation {chat_id}")));
        };
        conv.is_read = true;
        conv.unread_count = 0;
        Ok(conv.clone())
    }

    pub async fn set_archived(
        &self,
        chat_id: &str,
        archived: bool,
    ) -> Result<Conversation, ChatError> {
        self.transport.round_trip().await?;

        let mut inner = self.inner.write().await;
        let Some(conv) = inner
            .conversations
            .iter_mut()
            .find(|c| c.chat_id == chat_id)
        else {
            return Err(ChatError::not_found(format!("conversation {chat_id}")));
        };
        conv.archived = archived;
        Ok(conv.clone())
    }
}

/// No participant data exists beyond the chat id, so the counterpart is
/// derived from it.
fn counterpart_for(chat_id: &str) -> String {
    format!("user-{chat_id}")
}
