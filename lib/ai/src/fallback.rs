//! Ordered model fallback.
//!
//! Model identifiers available to a credential vary by account and API
//! version. The fallback tries the configured primary model and then a fixed
//! list of known names, moving on only when a candidate is reported
//! unavailable. Any other failure ends the attempt immediately.

use crate::backend::{GenerationBackend, GenerationRequest, GenerationResponse};
use crate::error::{FallbackError, LlmError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Primary model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";

/// Fixed fallback sequence tried after the primary model.
pub const FALLBACK_MODELS: &[&str] = &[
    "claude-3-5-sonnet-20240620",
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];

/// Ordered, de-duplicated list of model names to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCandidates(Vec<String>);

impl ModelCandidates {
    /// The primary model followed by `fallbacks`, each name at most once.
    #[must_use]
    pub fn new<I, S>(primary: impl Into<String>, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = vec![primary.into()];
        for name in fallbacks {
            let name = name.into();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Self(names)
    }

    /// The primary model followed by [`FALLBACK_MODELS`].
    #[must_use]
    pub fn with_default_fallbacks(primary: impl Into<String>) -> Self {
        Self::new(primary, FALLBACK_MODELS.iter().copied())
    }

    /// The configured primary model.
    #[must_use]
    pub fn primary(&self) -> &str {
        &self.0[0]
    }

    /// All candidates in attempt order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Iterates candidates in attempt order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for ModelCandidates {
    fn default() -> Self {
        Self::with_default_fallbacks(DEFAULT_MODEL)
    }
}

/// Result of a successful fallback run.
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    /// The candidate that produced the response.
    pub model: String,
    /// The generated response.
    pub response: GenerationResponse,
    /// Candidates tried, in order, ending with `model`.
    pub attempted: Vec<String>,
}

/// Drives a [`GenerationBackend`] through [`ModelCandidates`].
#[derive(Clone)]
pub struct ModelFallback {
    backend: Arc<dyn GenerationBackend>,
    candidates: ModelCandidates,
}

impl ModelFallback {
    /// Creates a fallback over `backend` trying `candidates` in order.
    #[must_use]
    pub fn new(backend: Arc<dyn GenerationBackend>, candidates: ModelCandidates) -> Self {
        Self {
            backend,
            candidates,
        }
    }

    /// The candidates this fallback tries.
    #[must_use]
    pub fn candidates(&self) -> &ModelCandidates {
        &self.candidates
    }

    /// Sends `request` to each candidate until one answers.
    ///
    /// # Errors
    ///
    /// Returns [`FallbackError::Generation`] as soon as a candidate fails for
    /// a reason other than availability, and
    /// [`FallbackError::AllModelsUnavailable`] if every candidate is
    /// unavailable.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<FallbackOutcome, FallbackError> {
        let mut attempted = Vec::with_capacity(self.candidates.as_slice().len());
        let mut last_error: Option<LlmError> = None;

        for model in self.candidates.iter() {
            attempted.push(model.to_string());
            debug!(model, attempt = attempted.len(), "Trying model candidate");

            match self.backend.generate(model, request).await {
                Ok(response) => {
                    if attempted.len() > 1 {
                        info!(model, attempts = attempted.len(), "Fell back to model");
                    }
                    return Ok(FallbackOutcome {
                        model: model.to_string(),
                        response,
                        attempted,
                    });
                }
                Err(error) if error.is_model_unavailable() => {
                    warn!(model, error = %error, "Model unavailable, trying next candidate");
                    last_error = Some(error);
                }
                Err(error) => {
                    return Err(FallbackError::Generation {
                        model: model.to_string(),
                        attempted,
                        error,
                    });
                }
            }
        }

        // Candidates are never empty, so the loop recorded at least one error.
        let last_error = last_error.unwrap_or(LlmError::InvalidConfig {
            reason: "no model candidates configured".to_string(),
        });
        Err(FallbackError::AllModelsUnavailable {
            attempted,
            last_error,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted backend shared by the tests in this crate.

    use super::*;
    use crate::backend::TokenUsage;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers per model name; unknown names are unavailable.
    #[derive(Default)]
    pub struct ScriptedBackend {
        pub outcomes: HashMap<String, Result<String, LlmError>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub fn with(mut self, model: &str, outcome: Result<&str, LlmError>) -> Self {
            self.outcomes
                .insert(model.to_string(), outcome.map(str::to_string));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn generate(
            &self,
            model: &str,
            _request: &GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            self.calls.lock().expect("calls lock").push(model.to_string());
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
}
