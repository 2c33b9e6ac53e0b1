//! Error types for server startup and request handling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rootcause::prelude::Report;
use rubber_soul_conversation::{RelayError, StoreError};
use serde::Serialize;
use std::fmt;

/// Startup errors. Any of these stops the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Configuration sources could not be read or deserialized.
    Load { reason: String },
    /// The API credential is not set.
    MissingCredential { variable: &'static str },
    /// The generation backend rejected its configuration.
    Backend { reason: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { reason } => write!(f, "failed to load configuration: {reason}"),
            Self::MissingCredential { variable } => write!(
                f,
                "{variable} not found in environment variables or {}.toml",
                crate::config::CONFIG_FILE
            ),
            Self::Backend { reason } => {
                write!(f, "invalid generation backend configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Errors returned by HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The id is unknown or malformed.
    ConversationNotFound { id: String },
    /// Relaying the message failed.
    Relay(Report<RelayError>),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { id } => Self::ConversationNotFound { id: id.to_string() },
        }
    }
}

impl From<Report<RelayError>> for ApiError {
    fn from(report: Report<RelayError>) -> Self {
        Self::Relay(report)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::ConversationNotFound { id } => {
                tracing::debug!(conversation_id = %id, "Conversation not found");
                (StatusCode::NOT_FOUND, "Conversation not found".to_string())
            }
            Self::Relay(report) => match report.current_context() {
                RelayError::NotFound { id } => {
                    tracing::debug!(conversation_id = %id, "Conversation not found");
                    (StatusCode::NOT_FOUND, "Conversation not found".to_string())
                }
                RelayError::ModelsUnavailable {
                    attempted,
                    last_error,
                } => {
                    tracing::error!(
                        attempted = %attempted.join(", "),
                        error = %last_error,
                        "No model candidate was available"
                    );
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!(
                            "Error calling Claude API: All models failed. Last error: {last_error}. \
                             Please check your API key has access to Claude models. \
                             Tried models: {}",
                            attempted.join(", ")
                        ),
                    )
                }
                RelayError::GenerationFailed { model, error, .. } => {
                    tracing::error!(model = %model, error = %error, "Generation call failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Error calling Claude API: {error}"),
                    )
                }
            },
        };

        (status, Json(ErrorBody { detail })).into_response()
    }
}
