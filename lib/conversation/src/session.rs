//! Per-conversation session settings.
//!
//! Settings follow a closed schema. A [`SessionPatch`] is merged field by
//! field: present fields overwrite, absent fields are left alone, and an
//! explicit `null` clears an optional text field. Keys outside the schema
//! are collected rather than stored so callers can report them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Default writing intensity for a new conversation.
pub const DEFAULT_INTENSITY: u8 = 2;

/// Whether drafts carry footnotes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Footnotes {
    #[default]
    #[serde(rename = "ON", alias = "on")]
    On,
    #[serde(rename = "OFF", alias = "off")]
    Off,
}

/// Session settings of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Target publishing platform.
    pub platform: Option<String>,
    /// Writing mode.
    pub mode: Option<String>,
    /// Post topic.
    pub topic: Option<String>,
    /// Angle taken on the topic.
    pub angle: Option<String>,
    /// Opening hook.
    pub hook: Option<String>,
    /// Writing intensity.
    pub intensity: u8,
    /// Footnote setting.
    pub footnotes: Footnotes,
    /// Number of the current draft.
    pub draft_version: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            platform: None,
            mode: None,
            topic: None,
            angle: None,
            hook: None,
            intensity: DEFAULT_INTENSITY,
            footnotes: Footnotes::On,
            draft_version: 0,
        }
    }
}

impl SessionSettings {
    /// Merges `patch` into these settings.
    pub fn apply(&mut self, patch: &SessionPatch) {
        fn merge_text(field: &mut Option<String>, update: &Option<Option<String>>) {
            if let Some(value) = update {
                field.clone_from(value);
            }
        }

        merge_text(&mut self.platform, &patch.platform);
        merge_text(&mut self.mode, &patch.mode);
        merge_text(&mut self.topic, &patch.topic);
        merge_text(&mut self.angle, &patch.angle);
        merge_text(&mut self.hook, &patch.hook);

        if let Some(intensity) = patch.intensity {
            self.intensity = intensity;
        }
        if let Some(footnotes) = patch.footnotes {
            self.footnotes = footnotes;
        }
        if let Some(draft_version) = patch.draft_version {
            self.draft_version = draft_version;
        }
    }
}

/// A partial update of [`SessionSettings`].
///
/// Text fields are doubly optional: the outer `None` means "absent", an
/// inner `None` means "cleared with `null`".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionPatch {
    #[serde(default, deserialize_with = "present")]
    pub platform: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub mode: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub topic: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub angle: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub hook: Option<Option<String>>,
    #[serde(default)]
    pub intensity: Option<u8>,
    #[serde(default)]
    pub footnotes: Option<Footnotes>,
    #[serde(default)]
    pub draft_version: Option<u32>,
    /// Keys outside the schema. Never merged.
    #[serde(flatten)]
    pub unknown: BTreeMap<String, JsonValue>,
}

impl SessionPatch {
    /// Names of keys that were ignored because they are not settings.
    #[must_use]
    pub fn ignored_keys(&self) -> Vec<String> {
        self.unknown.keys().cloned().collect()
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
