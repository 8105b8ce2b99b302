//! Pipeline settings.

use std::path::PathBuf;

/// Model used for script generation unless overridden.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";

/// Output cap for one generated script, in tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 300;

/// Settings shared by every run of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarratorConfig {
    /// Language model identifier.
    pub model: String,

    /// Maximum output tokens per script.
    pub max_tokens: u32,

    /// Directory holding the input copy and the audio files of a run.
    pub temp_dir: PathBuf,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temp_dir: std::env::temp_dir(),
        }
    }
}

impl NarratorConfig {
    /// Create a config with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }
}
