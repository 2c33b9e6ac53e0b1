//! System instruction loading.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name searched for when no path is configured.
pub const SYSTEM_PROMPT_FILE: &str = "RUBBERSOUL-BETA.txt";

/// Instruction used when no prompt file can be read.
pub const DEFAULT_SYSTEM_PROMPT: &str = "RUBBER SOUL BETA – The Trust Architecture Engine
AI-Assisted. Human-Souled.
Refined over 7M+ impressions, 16 craft dimensions, 14 trust patterns.
Created by Stephen Klein | Curiouser.AI";

/// The system instruction sent with every generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompt {
    text: String,
    source: Option<PathBuf>,
}

impl SystemPrompt {
    /// Wraps an inline instruction.
    #[must_use]
    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
        }
    }

    /// Loads the instruction from the first readable candidate file.
    ///
    /// The configured path is tried first, then [`SYSTEM_PROMPT_FILE`] in the
    /// working directory and its parent. Falls back to
    /// [`DEFAULT_SYSTEM_PROMPT`] if none can be read.
    #[must_use]
    pub fn load(configured: Option<&Path>) -> Self {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(path) = configured {
            candidates.push(path.to_path_buf());
        }
        candidates.push(PathBuf::from(SYSTEM_PROMPT_FILE));
        candidates.push(Path::new("..").join(SYSTEM_PROMPT_FILE));

        Self::load_from(&candidates)
    }

    fn load_from(candidates: &[PathBuf]) -> Self {
        for path in candidates {
            match fs::read_to_string(path) {
                Ok(text) => {
                    info!(path = %path.display(), bytes = text.len(), "Loaded system prompt");
                    return Self {
                        text,
                        source: Some(path.clone()),
                    };
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "System prompt file not present");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read system prompt file");
                }
            }
        }

        warn!("No system prompt file found, using built-in instruction");
        Self::inline(DEFAULT_SYSTEM_PROMPT)
    }

    /// The instruction text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The file the instruction was read from, if any.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self::inline(DEFAULT_SYSTEM_PROMPT)
    }
}
