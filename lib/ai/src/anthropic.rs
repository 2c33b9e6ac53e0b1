//! Anthropic Messages API backend.

use crate::backend::{
    ChatMessage, GenerationBackend, GenerationRequest, GenerationResponse, TokenUsage,
};
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Public API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Connection settings for [`AnthropicBackend`].
#[derive(Clone)]
pub struct AnthropicConfig {
    /// API credential sent as `x-api-key`.
    pub api_key: String,
    /// Base URL, without the `/v1/messages` path.
    pub base_url: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl AnthropicConfig {
    /// Creates a configuration for the public endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Overrides the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Generation backend that talks to the Anthropic HTTP API.
#[derive(Debug, Clone)]
pub struct AnthropicBackend {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicBackend {
    /// Creates a backend from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidConfig`] if the credential is empty or the
    /// HTTP client cannot be built.
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::InvalidConfig {
                reason: "API key is empty".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    #[instrument(skip(self, request), fields(messages = request.messages.len()))]
    async fn generate(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, LlmError> {
        let body = CreateMessageRequest {
            model,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: &request.messages,
        };

        let response = self
            .client
            .post(self.config.messages_url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Anthropic request did not complete");
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Transport {
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body = response.text().await.unwrap_or_default();
            debug!(status = %status, "Anthropic returned an error status");
            return Err(classify_error(model, status, &body, retry_after));
        }

        let parsed: CreateMessageResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::ResponseParseFailed {
                    reason: e.to_string(),
                })?;

        extract_text_response(model, parsed)
    }
}

#[derive(Serialize)]
struct CreateMessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CreateMessageResponse {
    #[serde(default)]
    model: Option<String>,
    content: Vec<ContentBlockResponse>,
    #[serde(default)]
    usage: Option<UsageResponse>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlockResponse {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct UsageResponse {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    r#type: String,
    message: String,
}

fn extract_text_response(
    model: &str,
    response: CreateMessageResponse,
) -> Result<GenerationResponse, LlmError> {
    let content = response
        .content
        .into_iter()
        .find_map(|block| match block {
            ContentBlockResponse::Text { text } => Some(text),
            ContentBlockResponse::Other => None,
        })
        .ok_or_else(|| LlmError::EmptyResponse {
            model: model.to_string(),
        })?;

    let usage = response
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        })
        .unwrap_or_default();

    Ok(GenerationResponse {
        content,
        usage,
        model: response.model.unwrap_or_else(|| model.to_string()),
    })
}

/// Maps an error status and body onto the typed error classes.
///
/// Availability is decided by the status code and the API's `error.type`
/// discriminant, never by the wording of the message.
fn classify_error(
    model: &str,
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
) -> LlmError {
    let (error_type, reason) = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(wrapper) => (Some(wrapper.error.r#type), wrapper.error.message),
        Err(_) if body.is_empty() => (None, status.to_string()),
        Err(_) => (None, body.to_string()),
    };

    match (status, error_type.as_deref()) {
        (StatusCode::NOT_FOUND, _) | (_, Some("not_found_error")) => LlmError::ModelUnavailable {
            model: model.to_string(),
            reason,
        },
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _)
        | (_, Some("authentication_error" | "permission_error")) => LlmError::Authentication {
            status: status.as_u16(),
            reason,
        },
        (StatusCode::TOO_MANY_REQUESTS, _) | (_, Some("rate_limit_error")) => {
            LlmError::RateLimited {
                retry_after_secs: retry_after.map(|d| d.as_secs()),
                reason,
            }
        }
        (StatusCode::BAD_REQUEST, _) | (_, Some("invalid_request_error")) => {
            LlmError::InvalidRequest { reason }
        }
        _ => LlmError::ServiceError {
            status: status.as_u16(),
            reason,
        },
    }
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
