//! Conversation storage.
//!
//! [`ConversationStore`] is the seam between the relay and whatever holds
//! conversations. [`MemoryConversationStore`] keeps them for the lifetime of
//! the process: nothing expires and nothing is persisted.

use crate::conversation::Conversation;
use crate::error::StoreError;
use crate::message::{Message, MessageRole};
use crate::session::{SessionPatch, SessionSettings};
use async_trait::async_trait;
use rubber_soul_ai::ChatMessage;
use rubber_soul_core::ConversationId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Trait for conversation storage.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Creates an empty conversation with default settings.
    async fn create(&self) -> ConversationId;

    /// Returns true if the conversation exists.
    async fn contains(&self, id: ConversationId) -> bool;

    /// Gets a snapshot of a conversation.
    async fn get(&self, id: ConversationId) -> Result<Conversation, StoreError>;

    /// Appends a message stamped with the current time.
    async fn append_message(
        &self,
        id: ConversationId,
        role: MessageRole,
        content: String,
    ) -> Result<Message, StoreError>;

    /// The full history as role/content pairs, oldest first.
    async fn history(&self, id: ConversationId) -> Result<Vec<ChatMessage>, StoreError>;

    /// Gets the session settings.
    async fn session(&self, id: ConversationId) -> Result<SessionSettings, StoreError>;

    /// Merges `patch` into the session settings and returns the result.
    async fn update_session(
        &self,
        id: ConversationId,
        patch: &SessionPatch,
    ) -> Result<SessionSettings, StoreError>;

    /// Number of live conversations.
    async fn count(&self) -> usize;
}

/// In-memory conversation store.
///
/// The map lock is held only to find a conversation; each conversation has
/// its own lock, so work on one conversation never waits on another.
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    conversations: RwLock<HashMap<ConversationId, Arc<Mutex<Conversation>>>>,
}

impl MemoryConversationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, id: ConversationId) -> Result<Arc<Mutex<Conversation>>, StoreError> {
        self.conversations
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { id })
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn create(&self) -> ConversationId {
        let conversation = Conversation::new();
        let id = conversation.id;
        self.conversations
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(conversation)));
        debug!(conversation_id = %id, "Created conversation");
        id
    }

    async fn contains(&self, id: ConversationId) -> bool {
        self.conversations.read().await.contains_key(&id)
    }

    async fn get(&self, id: ConversationId) -> Result<Conversation, StoreError> {
        let entry = self.entry(id).await?;
        let conversation = entry.lock().await;
        Ok(conversation.clone())
    }

    async fn append_message(
        &self,
        id: ConversationId,
        role: MessageRole,
        content: String,
    ) -> Result<Message, StoreError> {
        let entry = self.entry(id).await?;
        let mut conversation = entry.lock().await;
        Ok(conversation.push(role, content).clone())
    }

    async fn history(&self, id: ConversationId) -> Result<Vec<ChatMessage>, StoreError> {
        let entry = self.entry(id).await?;
        let conversation = entry.lock().await;
        Ok(conversation.history())
    }

    async fn session(&self, id: ConversationId) -> Result<SessionSettings, StoreError> {
        let entry = self.entry(id).await?;
        let conversation = entry.lock().await;
        Ok(conversation.session.clone())
    }

    async fn update_session(
        &self,
        id: ConversationId,
        patch: &SessionPatch,
    ) -> Result<SessionSettings, StoreError> {
        let entry = self.entry(id).await?;
        let mut conversation = entry.lock().await;
        conversation.session.apply(patch);
        Ok(conversation.session.clone())
    }

    async fn count(&self) -> usize {
        self.conversations.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Footnotes;

    #[tokio::test]
    async fn create_yields_distinct_retrievable_conversations() {
        let store = MemoryConversationStore::new();
        let first = store.create().await;
        let second = store.create().await;

        assert_ne!(first, second);
        assert_eq!(store.count().await, 2);

        for id in [first, second] {
            let conversation = store.get(id).await.expect("conversation exists");
            assert_eq!(conversation.id, id);
            assert!(conversation.messages.is_empty());
            assert_eq!(conversation.session.intensity, 2);
            assert_eq!(conversation.session.footnotes, Footnotes::On);
            assert_eq!(conversation.session.draft_version, 0);
        }
    }

    #[tokio::test]
    async fn unknown_id_is_not_found_everywhere() {
        let store = MemoryConversationStore::new();
        let id = ConversationId::new();
        let expected = StoreError::NotFound { id };

        assert!(!store.contains(id).await);
        assert_eq!(store.get(id).await.expect_err("get"), expected);
        assert_eq!(store.history(id).await.expect_err("history"), expected);
        assert_eq!(store.session(id).await.expect_err("session"), expected);
        assert_eq!(
            store
                .append_message(id, MessageRole::User, "hi".to_string())
                .await
                .expect_err("append"),
            expected
        );
        assert_eq!(
            store
                .update_session(id, &SessionPatch::default())
                .await
                .expect_err("update"),
            expected
        );
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn appended_pairs_keep_chronological_order() {
        let store = MemoryConversationStore::new();
        let id = store.create().await;

        for turn in 0..5 {
            store
                .append_message(id, MessageRole::User, format!("question {turn}"))
                .await
                .expect("append user");
            store
                .append_message(id, MessageRole::Assistant, format!("answer {turn}"))
                .await
                .expect("append assistant");
        }

        let conversation = store.get(id).await.expect("conversation exists");
        assert_eq!(conversation.messages.len(), 10);
        for (index, message) in conversation.messages.iter().enumerate() {
            let turn = index / 2;
            if index % 2 == 0 {
                assert_eq!(message.role, MessageRole::User);
                assert_eq!(message.content, format!("question {turn}"));
            } else {
                assert_eq!(message.role, MessageRole::Assistant);
                assert_eq!(message.content, format!("answer {turn}"));
            }
        }
        assert!(
            conversation
                .messages
                .windows(2)
                .all(|pair| pair[0].timestamp <= pair[1].timestamp)
        );
    }

    #[tokio::test]
    async fn update_session_merges_and_returns_snapshot() {
        let store = MemoryConversationStore::new();
        let id = store.create().await;

        let patch: SessionPatch =
            serde_json::from_value(serde_json::json!({"intensity": 3})).expect("patch");
        let updated = store.update_session(id, &patch).await.expect("update");

        assert_eq!(updated.intensity, 3);
        assert_eq!(updated.footnotes, Footnotes::On);
        assert_eq!(updated.draft_version, 0);
        assert_eq!(store.session(id).await.expect("session"), updated);
    }

    #[tokio::test]
    async fn history_matches_messages() {
        let store = MemoryConversationStore::new();
        let id = store.create().await;
        store
            .append_message(id, MessageRole::User, "hello".to_string())
            .await
            .expect("append");

        let history = store.history(id).await.expect("history");
        assert_eq!(history, [ChatMessage::user("hello")]);
    }
}
