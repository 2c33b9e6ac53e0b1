//! Error types for the conversation crate.
//!
//! - `StoreError`: errors from conversation store operations
//! - `RelayError`: errors from relaying a message to the generation service,
//!   reported through `rootcause::Report`

use rubber_soul_ai::{FallbackError, LlmError};
use rubber_soul_core::ConversationId;
use std::fmt;

/// Errors from conversation store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Conversation not found.
    NotFound { id: ConversationId },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "conversation not found: {id}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from relaying a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The conversation does not exist. Nothing was stored.
    NotFound { id: ConversationId },
    /// Every model candidate reported itself unavailable.
    ModelsUnavailable {
        attempted: Vec<String>,
        last_error: LlmError,
    },
    /// The generation call failed for a reason other than model
    /// availability; later candidates were not tried.
    GenerationFailed {
        model: String,
        attempted: Vec<String>,
        error: LlmError,
    },
}

impl RelayError {
    /// Model names tried before failing, empty for [`RelayError::NotFound`].
    #[must_use]
    pub fn attempted(&self) -> &[String] {
        match self {
            Self::NotFound { .. } => &[],
            Self::ModelsUnavailable { attempted, .. }
            | Self::GenerationFailed { attempted, .. } => attempted,
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "conversation not found: {id}"),
            Self::ModelsUnavailable {
                attempted,
                last_error,
            } => write!(
                f,
                "all models failed. Last error: {last_error}. Tried models: {}",
                attempted.join(", ")
            ),
            Self::GenerationFailed { model, error, .. } => {
                write!(f, "generation with model '{model}' failed: {error}")
            }
        }
    }
}

impl std::error::Error for RelayError {}

impl From<StoreError> for RelayError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { id } => Self::NotFound { id },
        }
    }
}

impl From<FallbackError> for RelayError {
    fn from(error: FallbackError) -> Self {
        match error {
            FallbackError::AllModelsUnavailable {
                attempted,
                last_error,
            } => Self::ModelsUnavailable {
                attempted,
                last_error,
            },
            FallbackError::Generation {
                model,
                attempted,
                error,
            } => Self::GenerationFailed {
                model,
                attempted,
                error,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let id = ConversationId::new();
        let err = StoreError::NotFound { id };
        assert_eq!(err.to_string(), format!("conversation not found: {id}"));
    }

    #[test]
    fn fallback_error_maps_to_relay_error() {
        let err = RelayError::from(FallbackError::Generation {
            model: "claude-3-haiku-20240307".to_string(),
            attempted: vec!["claude-3-haiku-20240307".to_string()],
            error: LlmError::Timeout,
        });
        assert_eq!(err.attempted(), ["claude-3-haiku-20240307"]);
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn models_unavailable_display_lists_candidates() {
        let err = RelayError::ModelsUnavailable {
            attempted: vec!["a".to_string(), "b".to_string()],
            last_error: LlmError::ModelUnavailable {
                model: "b".to_string(),
                reason: "model: b".to_string(),
            },
        };
        assert!(err.to_string().contains("Tried models: a, b"));
    }
}
