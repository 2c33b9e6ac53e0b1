//! Centralized server configuration.
//!
//! Loaded via the `config` crate from an optional `rubber-soul.toml` file
//! overlaid with environment variables (`ANTHROPIC_API_KEY`, `CLAUDE_MODEL`,
//! `BIND_ADDR`, ...).

use crate::error::ConfigurationError;
use rootcause::prelude::Report;
use rubber_soul_ai::{AnthropicConfig, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Name of the optional configuration file, without extension.
pub const CONFIG_FILE: &str = "rubber-soul";

/// Server configuration.
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    /// Anthropic API credential. Required.
    #[serde(default)]
    anthropic_api_key: Option<String>,

    /// Primary model, tried before the fixed fallback list.
    #[serde(default = "default_claude_model")]
    pub claude_model: String,

    /// Base URL of the Anthropic API.
    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,

    /// Maximum tokens generated per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Timeout for one generation call, in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// System prompt file tried before the default locations.
    #[serde(default)]
    pub system_prompt_path: Option<PathBuf>,

    /// Address the HTTP server listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

fn default_claude_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_anthropic_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_request_timeout_seconds() -> u64 {
    120
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

impl ServerConfig {
    /// Loads configuration from `rubber-soul.toml` (if present) and
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be read or the API
    /// credential is missing.
    pub fn from_env() -> rubber_soul_core::Result<Self, ConfigurationError> {
        let source = config::Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::Load {
                reason: e.to_string(),
            })?;

        Self::from_source(source)
    }

    /// Deserializes and validates an already-built configuration source.
    ///
    /// # Errors
    ///
    /// Returns an error if a value has the wrong type or the API credential
    /// is missing or blank.
    pub fn from_source(source: config::Config) -> rubber_soul_core::Result<Self, ConfigurationError> {
        let config: Self = source
            .try_deserialize()
            .map_err(|e| ConfigurationError::Load {
                reason: e.to_string(),
            })?;

        match config.anthropic_api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(config),
            _ => Err(Report::from(ConfigurationError::MissingCredential {
                variable: "ANTHROPIC_API_KEY",
            })),
        }
    }

    /// Connection settings for the generation backend.
    #[must_use]
    pub fn anthropic(&self) -> AnthropicConfig {
        AnthropicConfig::new(self.anthropic_api_key.clone().unwrap_or_default())
            .with_base_url(self.anthropic_base_url.clone())
            .with_timeout(Duration::from_secs(self.request_timeout_seconds))
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("anthropic_api_key", &"<redacted>")
            .field("claude_model", &self.claude_model)
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("system_prompt_path", &self.system_prompt_path)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}
