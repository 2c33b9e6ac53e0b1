//! Shared application state.

use crate::config::ServerConfig;
use crate::error::ConfigurationError;
use rubber_soul_ai::{AnthropicBackend, ModelCandidates, ModelFallback, SystemPrompt};
use rubber_soul_conversation::{ConversationStore, MemoryConversationStore, MessageRelay};
use std::sync::Arc;

/// Name reported by the health endpoint.
pub const SERVICE_NAME: &str = "Rubber Soul Beta API";

/// Shared application state.
pub struct AppState {
    /// Relay for sending messages; owns the conversation store.
    pub relay: MessageRelay,
}

impl AppState {
    /// Creates a new application state.
    #[must_use]
    pub fn new(relay: MessageRelay) -> Self {
        Self { relay }
    }

    /// Wires the in-memory store, the Anthropic backend and the model
    /// fallback from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the generation backend cannot be built.
    pub fn from_config(config: &ServerConfig) -> rubber_soul_core::Result<Self, ConfigurationError> {
        let backend =
            AnthropicBackend::new(config.anthropic()).map_err(|e| ConfigurationError::Backend {
                reason: e.to_string(),
            })?;

        let candidates = ModelCandidates::with_default_fallbacks(config.claude_model.clone());
        tracing::info!(
            models = %candidates.as_slice().join(", "),
            "Model candidates"
        );

        let system_prompt = SystemPrompt::load(config.system_prompt_path.as_deref());
        let store: Arc<dyn ConversationStore> = Arc::new(MemoryConversationStore::new());
        let relay = MessageRelay::new(
            store,
            ModelFallback::new(Arc::new(backend), candidates),
            system_prompt,
        )
        .with_max_tokens(config.max_tokens);

        Ok(Self::new(relay))
    }

    /// The conversation store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        self.relay.store()
    }
}
