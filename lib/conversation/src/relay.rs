//! Message relay.
//!
//! Turns one user utterance into one assistant utterance: the user message
//! is stored, the whole history goes to the model fallback, and the answer is
//! stored after it.
//!
//! Sends to the same conversation are serialized by a per-conversation turn
//! lock held from the user append until the assistant append. The store's own
//! locks are released during generation, so readers never wait on the
//! generation service.

use crate::error::RelayError;
use crate::message::MessageRole;
use crate::store::ConversationStore;
use rootcause::prelude::Report;
use rubber_soul_ai::{DEFAULT_MAX_TOKENS, GenerationRequest, ModelFallback, SystemPrompt};
use rubber_soul_core::ConversationId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};

/// The outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayReply {
    /// The conversation the reply was appended to.
    pub conversation_id: ConversationId,
    /// The generated text.
    pub assistant_message: String,
    /// The model that generated it.
    pub model: String,
    /// Models tried, in order, ending with `model`.
    pub attempted_models: Vec<String>,
}

/// Relays user messages to the generation service.
pub struct MessageRelay {
    store: Arc<dyn ConversationStore>,
    fallback: ModelFallback,
    system_prompt: SystemPrompt,
    max_tokens: u32,
    turns: Mutex<HashMap<ConversationId, Arc<Mutex<()>>>>,
}

impl MessageRelay {
    /// Creates a relay over `store` using `fallback` for generation.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConversationStore>,
        fallback: ModelFallback,
        system_prompt: SystemPrompt,
    ) -> Self {
        Self {
            store,
            fallback,
            system_prompt,
            max_tokens: DEFAULT_MAX_TOKENS,
            turns: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the maximum number of tokens generated per reply.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// The store this relay appends to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Sends `content` as the user and returns the assistant's reply.
    ///
    /// The user message stays in the history even if generation fails.
    ///
    /// # Errors
    ///
    /// - [`RelayError::NotFound`] if the conversation does not exist; nothing
    ///   is stored in that case.
    /// - [`RelayError::GenerationFailed`] on the first failure that is not a
    ///   model-availability failure.
    /// - [`RelayError::ModelsUnavailable`] if every model candidate was
    ///   unavailable.
    #[instrument(skip_all, fields(conversation_id = %conversation_id))]
    pub async fn send(
        &self,
        conversation_id: ConversationId,
        content: impl Into<String>,
    ) -> rubber_soul_core::Result<RelayReply, RelayError> {
        if !self.store.contains(conversation_id).await {
            return Err(Report::from(RelayError::NotFound {
                id: conversation_id,
            }));
        }

        let turn = self.turn_lock(conversation_id).await;
        let _turn = turn.lock().await;

        self.store
            .append_message(conversation_id, MessageRole::User, content.into())
            .await
            .map_err(RelayError::from)?;

        let history = self
            .store
            .history(conversation_id)
            .await
            .map_err(RelayError::from)?;

        let request = GenerationRequest::new(history)
            .with_system(self.system_prompt.text())
            .with_max_tokens(self.max_tokens);

        let outcome = self
            .fallback
            .generate(&request)
            .await
            .map_err(RelayError::from)?;

        self.store
            .append_message(
                conversation_id,
                MessageRole::Assistant,
                outcome.response.content.clone(),
            )
            .await
            .map_err(RelayError::from)?;

        info!(
            model = %outcome.model,
            attempts = outcome.attempted.len(),
            output_tokens = outcome.response.usage.output_tokens,
            "Relayed message"
        );

        Ok(RelayReply {
            conversation_id,
            assistant_message: outcome.response.content,
            model: outcome.model,
            attempted_models: outcome.attempted,
        })
    }

    async fn turn_lock(&self, id: ConversationId) -> Arc<Mutex<()>> {
        self.turns.lock().await.entry(id).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryConversationStore;
    use async_trait::async_trait;
    use rubber_soul_ai::{
        ChatMessage, GenerationBackend, GenerationResponse, LlmError, ModelCandidates,
        TokenUsage,
    };
    use std::sync::Mutex as StdMutex;

    /// Answers per model name; unknown names are unavailable. Every call is
    /// recorded with its request.
    #[derive(Default)]
    struct ScriptedBackend {
        outcomes: HashMap<String, Result<String, LlmError>>,
        calls: StdMutex<Vec<(String, GenerationRequest)>>,
    }

    impl ScriptedBackend {
        fn with(mut self, model: &str, outcome: Result<&str, LlmError>) -> Self {
            self.outcomes
                .insert(model.to_string(), outcome.map(str::to_string));
            self
        }

        fn models_called(&self) -> Vec<String> {
            self.calls
                .lock()
                .expect("calls lock")
                .iter()
                .map(|(model, _)| model.clone())
                .collect()
        }

        fn last_request(&self) -> GenerationRequest {
            self.calls
                .lock()
                .expect("calls lock")
                .last()
                .map(|(_, request)| request.clone())
                .expect("at least one call")
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn generate(
            &self,
            model: &str,
            request: &GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push((model.to_string(), request.clone()));
            match self.outcomes.get(model) {
                Some(Ok(text)) => Ok(GenerationResponse {
                    content: text.clone(),
                    usage: TokenUsage::default(),
                    model: model.to_string(),
                }),
                Some(Err(error)) => Err(error.clone()),
                None => Err(LlmError::ModelUnavailable {
                    model: model.to_string(),
                    reason: format!("model: {model}"),
                }),
            }
        }
    }

    fn relay(
        backend: Arc<ScriptedBackend>,
        candidates: ModelCandidates,
    ) -> (MessageRelay, Arc<MemoryConversationStore>) {
        let store = Arc::new(MemoryConversationStore::new());
        let relay = MessageRelay::new(
            store.clone(),
            ModelFallback::new(backend, candidates),
            SystemPrompt::inline("You write posts."),
        );
        (relay, store)
    }

    #[tokio::test]
    async fn send_appends_user_then_assistant() {
        let backend = Arc::new(ScriptedBackend::default().with("primary", Ok("Hi there")));
        let (relay, store) = relay(backend.clone(), ModelCandidates::new("primary", ["other"]));
        let id = store.create().await;

        let reply = relay.send(id, "hello").await.expect("send succeeds");

        assert_eq!(reply.assistant_message, "Hi there");
        assert_eq!(reply.conversation_id, id);
        assert_eq!(reply.model, "primary");

        let conversation = store.get(id).await.expect("conversation");
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0].role, MessageRole::User);
        assert_eq!(conversation.messages[0].content, "hello");
        assert_eq!(conversation.messages[1].role, MessageRole::Assistant);
        assert_eq!(conversation.messages[1].content, "Hi there");

        let request = backend.last_request();
        assert_eq!(request.system.as_deref(), Some("You write posts."));
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[tokio::test]
    async fn whole_history_is_resent() {
        let backend = Arc::new(ScriptedBackend::default().with("primary", Ok("ok")));
        let (relay, store) = relay(backend.clone(), ModelCandidates::new("primary", ["other"]));
        let id = store.create().await;

        relay.send(id, "first").await.expect("first send");
        relay.send(id, "second").await.expect("second send");

        assert_eq!(
            backend.last_request().messages,
            [
                ChatMessage::user("first"),
                ChatMessage::assistant("ok"),
                ChatMessage::user("second"),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found_and_stores_nothing() {
        let backend = Arc::new(ScriptedBackend::default().with("primary", Ok("unused")));
        let (relay, store) = relay(backend.clone(), ModelCandidates::new("primary", ["other"]));
        let existing = store.create().await;
        let unknown = ConversationId::new();

        let err = relay.send(unknown, "hello").await.expect_err("not found");

        assert_eq!(
            err.current_context(),
            &RelayError::NotFound { id: unknown }
        );
        assert_eq!(store.count().await, 1);
        assert!(store.get(existing).await.expect("existing").messages.is_empty());
        assert!(backend.models_called().is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_working_model() {
        let backend = Arc::new(ScriptedBackend::default().with("working", Ok("from fallback")));
        let (relay, store) = relay(
            backend.clone(),
            ModelCandidates::new("missing", ["working", "after"]),
        );
        let id = store.create().await;

        let reply = relay.send(id, "hello").await.expect("send succeeds");

        assert_eq!(reply.model, "working");
        assert_eq!(reply.attempted_models, ["missing", "working"]);
        assert_eq!(backend.models_called(), ["missing", "working"]);
        assert_eq!(
            store.get(id).await.expect("conversation").messages[1].content,
            "from fallback"
        );
    }

    #[tokio::test]
    async fn all_models_unavailable_is_aggregated() {
        let backend = Arc::new(ScriptedBackend::default());
        let (relay, store) = relay(backend, ModelCandidates::new("a", ["b", "c"]));
        let id = store.create().await;

        let err = relay.send(id, "hello").await.expect_err("all unavailable");

        match err.current_context() {
            RelayError::ModelsUnavailable {
                attempted,
                last_error,
            } => {
                assert_eq!(attempted, &["a", "b", "c"]);
                assert!(last_error.is_model_unavailable());
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let conversation = store.get(id).await.expect("conversation");
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn other_failure_is_surfaced_without_trying_more_models() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with(
                    "primary",
                    Err(LlmError::Authentication {
                        status: 401,
                        reason: "invalid x-api-key".to_string(),
                    }),
                )
                .with("fallback", Ok("unreachable")),
        );
        let (relay, store) = relay(backend.clone(), ModelCandidates::new("primary", ["fallback"]));
        let id = store.create().await;

        let err = relay.send(id, "hello").await.expect_err("auth failure");

        assert!(matches!(
            err.current_context(),
            RelayError::GenerationFailed {
                error: LlmError::Authentication { .. },
                ..
            }
        ));
        assert_eq!(err.current_context().attempted(), ["primary"]);
        assert_eq!(backend.models_called(), ["primary"]);
    }

    #[tokio::test]
    async fn repeated_sends_leave_two_messages_per_turn() {
        let backend = Arc::new(ScriptedBackend::default().with("primary", Ok("reply")));
        let (relay, store) = relay(backend, ModelCandidates::new("primary", ["other"]));
        let id = store.create().await;

        for turn in 0..4 {
            relay.send(id, format!("message {turn}")).await.expect("send");
        }

        let conversation = store.get(id).await.expect("conversation");
        assert_eq!(conversation.messages.len(), 8);
        assert!(conversation.messages.chunks(2).enumerate().all(|(turn, pair)| {
            pair[0].role == MessageRole::User
                && pair[0].content == format!("message {turn}")
                && pair[1].role == MessageRole::Assistant
        }));
    }

    #[tokio::test]
    async fn concurrent_sends_to_one_conversation_do_not_interleave() {
        let backend = Arc::new(ScriptedBackend::default().with("primary", Ok("reply")));
        let (relay, store) = relay(backend, ModelCandidates::new("primary", ["other"]));
        let relay = Arc::new(relay);
        let id = store.create().await;

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let relay = relay.clone();
                tokio::spawn(async move { relay.send(id, format!("message {n}")).await })
            })
            .collect();
        for handle in handles {
            handle.await.expect("task").expect("send");
        }

        let conversation = store.get(id).await.expect("conversation");
        assert_eq!(conversation.messages.len(), 16);
        assert!(conversation.messages.chunks(2).all(|pair| {
            pair[0].role == MessageRole::User && pair[1].role == MessageRole::Assistant
        }));
    }
}
