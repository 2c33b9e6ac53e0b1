//! Checks which Claude models the configured API key can reach.
//!
//! Sends a minimal request to each candidate in order and stops at the first
//! one that answers.

use rubber_soul_ai::{
    AnthropicBackend, ChatMessage, GenerationBackend, GenerationRequest, GenerationResponse,
    LlmError, ModelCandidates,
};
use rubber_soul_server::{config::ServerConfig, telemetry};

const PROBE_MAX_TOKENS: u32 = 10;

/// Undated aliases tried after the dated candidates.
const UNDATED_ALIASES: [&str; 2] = ["claude-3-5-sonnet", "claude-3-sonnet"];

/// Result of one model check.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ModelCheck {
    Works { reply: String },
    NotFound,
    Failed { reason: String },
}

impl ModelCheck {
    fn from_result(result: Result<GenerationResponse, LlmError>) -> Self {
        match result {
            Ok(response) => Self::Works {
                reply: response.content.trim().to_string(),
            },
            Err(e) if e.is_model_unavailable() => Self::NotFound,
            Err(e) => Self::Failed {
                reason: e.to_string(),
            },
        }
    }

    fn summary(&self) -> String {
        match self {
            Self::Works { reply } => format!("works: {reply}"),
            Self::NotFound => "not found".to_string(),
            Self::Failed { reason } => format!("error: {reason}"),
        }
    }
}

/// Candidates for `primary`, followed by the undated aliases.
fn models_to_check(primary: impl Into<String>) -> Vec<String> {
    let mut models: Vec<String> = ModelCandidates::with_default_fallbacks(primary)
        .iter()
        .map(str::to_string)
        .collect();
    for alias in UNDATED_ALIASES {
        if !models.iter().any(|m| m == alias) {
            models.push(alias.to_string());
        }
    }
    models
}

#[tokio::main]
async fn main() {
    telemetry::init_tracing();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let backend = match AnthropicBackend::new(config.anthropic()) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build generation backend");
            std::process::exit(1);
        }
    };

    let request = GenerationRequest::new(vec![ChatMessage::user("Hi")])
        .with_max_tokens(PROBE_MAX_TOKENS);

    for model in models_to_check(config.claude_model.clone()) {
        let check = ModelCheck::from_result(backend.generate(&model, &request).await);
        println!("Testing {model}: {}", check.summary());
        if matches!(check, ModelCheck::Works { .. }) {
            println!();
            println!("Working model found. Set CLAUDE_MODEL={model}");
            return;
        }
    }

    println!();
    println!("No model worked. Check that your API key has access to Claude models.");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rubber_soul_ai::{FALLBACK_MODELS, TokenUsage};

    #[test]
    fn undated_aliases_follow_dated_candidates() {
        let models = models_to_check("claude-3-haiku-20240307");
        assert_eq!(models[0], "claude-3-haiku-20240307");
        assert_eq!(models[models.len() - 2..], ["claude-3-5-sonnet", "claude-3-sonnet"]);
        for fallback in FALLBACK_MODELS {
            assert_eq!(models.iter().filter(|m| m.as_str() == *fallback).count(), 1);
        }
    }

    #[test]
    fn alias_as_primary_is_not_repeated() {
        let models = models_to_check("claude-3-sonnet");
        assert_eq!(models[0], "claude-3-sonnet");
        assert_eq!(models.iter().filter(|m| m.as_str() == "claude-3-sonnet").count(), 1);
        assert_eq!(models.last().map(String::as_str), Some("claude-3-5-sonnet"));
    }

    #[test]
    fn checks_distinguish_not_found_from_other_errors() {
        let works = ModelCheck::from_result(Ok(GenerationResponse {
            content: " Hello! ".to_string(),
            usage: TokenUsage::default(),
            model: "claude-3-haiku-20240307".to_string(),
        }));
        assert_eq!(
            works,
            ModelCheck::Works {
                reply: "Hello!".to_string()
            }
        );

        let missing = ModelCheck::from_result(Err(LlmError::ModelUnavailable {
            model: "claude-3-sonnet".to_string(),
            reason: "model: claude-3-sonnet".to_string(),
        }));
        assert_eq!(missing, ModelCheck::NotFound);
        assert_eq!(missing.summary(), "not found");

        let denied = ModelCheck::from_result(Err(LlmError::Authentication {
            status: 401,
            reason: "invalid x-api-key".to_string(),
        }));
        assert!(matches!(denied, ModelCheck::Failed { .. }));
        assert!(denied.summary().starts_with("error: "));
        assert!(denied.summary().contains("invalid x-api-key"));
    }
}
