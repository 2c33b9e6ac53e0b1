//! Error types for the AI crate.
//!
//! - `LlmError`: a single generation call failed
//! - `FallbackError`: the ordered candidate loop gave up

use std::fmt;

/// Errors from a single generation call.
///
/// The variants are the classification the fallback loop acts on: only
/// [`LlmError::ModelUnavailable`] lets it move to the next candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// The service does not know the requested model, or the credential
    /// cannot reach it.
    ModelUnavailable { model: String, reason: String },
    /// The credential was rejected.
    Authentication { status: u16, reason: String },
    /// Rate limit or quota exceeded.
    RateLimited {
        retry_after_secs: Option<u64>,
        reason: String,
    },
    /// The service rejected the request as malformed.
    InvalidRequest { reason: String },
    /// The service answered with some other error status.
    ServiceError { status: u16, reason: String },
    /// The request never got a response.
    Transport { reason: String },
    /// Timeout waiting for response.
    Timeout,
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// The response carried no text segment.
    EmptyResponse { model: String },
    /// Invalid backend configuration.
    InvalidConfig { reason: String },
}

impl LlmError {
    /// Returns true if the next model candidate should be tried.
    #[must_use]
    pub fn is_model_unavailable(&self) -> bool {
        matches!(self, Self::ModelUnavailable { .. })
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelUnavailable { model, reason } => {
                write!(f, "model '{model}' unavailable: {reason}")
            }
            Self::Authentication { status, reason } => {
                write!(f, "authentication failed (HTTP {status}): {reason}")
            }
            Self::RateLimited {
                retry_after_secs,
                reason,
            } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s: {reason}")
                } else {
                    write!(f, "rate limited: {reason}")
                }
            }
            Self::InvalidRequest { reason } => write!(f, "invalid request: {reason}"),
            Self::ServiceError { status, reason } => {
                write!(f, "generation service error (HTTP {status}): {reason}")
            }
            Self::Transport { reason } => write!(f, "request failed: {reason}"),
            Self::Timeout => write!(f, "generation request timed out"),
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse generation response: {reason}")
            }
            Self::EmptyResponse { model } => {
                write!(f, "model '{model}' returned no text")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid generation backend configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

/// Errors from the ordered model fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackError {
    /// Every candidate reported itself unavailable.
    AllModelsUnavailable {
        attempted: Vec<String>,
        last_error: LlmError,
    },
    /// A candidate failed for a reason other than availability; the
    /// remaining candidates were not tried.
    Generation {
        model: String,
        attempted: Vec<String>,
        error: LlmError,
    },
}

impl FallbackError {
    /// Model names tried before giving up, in order.
    #[must_use]
    pub fn attempted(&self) -> &[String] {
        match self {
            Self::AllModelsUnavailable { attempted, .. } | Self::Generation { attempted, .. } => {
                attempted
            }
        }
    }

    /// The error from the last attempted candidate.
    #[must_use]
    pub fn last_error(&self) -> &LlmError {
        match self {
            Self::AllModelsUnavailable { last_error, .. } => last_error,
            Self::Generation { error, .. } => error,
        }
    }
}

impl fmt::Display for FallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllModelsUnavailable {
                attempted,
                last_error,
            } => write!(
                f,
                "all models failed. Last error: {last_error}. Tried models: {}",
                attempted.join(", ")
            ),
            Self::Generation { model, error, .. } => {
                write!(f, "generation with model '{model}' failed: {error}")
            }
        }
    }
}

impl std::error::Error for FallbackError {}
