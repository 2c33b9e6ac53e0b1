//! Conversation state.

use crate::message::{Message, MessageRole};
use crate::session::SessionSettings;
use chrono::{DateTime, Utc};
use rubber_soul_ai::ChatMessage;
use rubber_soul_core::ConversationId;
use serde::{Deserialize, Serialize};

/// A conversation: append-only message history plus session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation identifier.
    pub id: ConversationId,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
    /// Messages in insertion order.
    pub messages: Vec<Message>,
    /// Session settings.
    pub session: SessionSettings,
}

impl Conversation {
    /// Creates an empty conversation with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ConversationId::new(),
            created_at: Utc::now(),
            messages: Vec::new(),
            session: SessionSettings::default(),
        }
    }

    /// Appends a message and returns a reference to it.
    pub fn push(&mut self, role: MessageRole, content: impl Into<String>) -> &Message {
        self.messages.push(Message::new(role, content));
        &self.messages[self.messages.len() - 1]
    }

    /// Returns the number of messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Returns the last message, if any.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The whole history as role/content pairs, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(Message::to_chat_message).collect()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
