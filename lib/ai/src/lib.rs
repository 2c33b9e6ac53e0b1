//! Generation primitives for rubber-soul.
//!
//! This crate provides:
//!
//! - **Backend**: the `GenerationBackend` seam and its request/response types
//! - **Anthropic**: the Messages API implementation of that seam
//! - **Fallback**: ordered model candidates tried until one is available
//! - **Prompt**: loading of the system instruction

pub mod anthropic;
pub mod backend;
pub mod error;
pub mod fallback;
pub mod prompt;

pub use anthropic::{AnthropicBackend, AnthropicConfig, DEFAULT_BASE_URL};
pub use backend::{
    ChatMessage, ChatRole, DEFAULT_MAX_TOKENS, GenerationBackend, GenerationRequest,
    GenerationResponse, TokenUsage,
};
pub use error::{FallbackError, LlmError};
pub use fallback::{
    DEFAULT_MODEL, FALLBACK_MODELS, FallbackOutcome, ModelCandidates, ModelFallback,
};
pub use prompt::{DEFAULT_SYSTEM_PROMPT, SYSTEM_PROMPT_FILE, SystemPrompt};
