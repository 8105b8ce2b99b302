//! Narration script generation via a language model.

use crate::outcome::{CallOutcome, Notice};
use crate::types::Script;
use std::convert::Infallible;
use thiserror::Error;

/// A single-prompt completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    /// The single user-role message.
    pub prompt: String,
    pub max_tokens: u32,
}

/// Errors reported by a language model client.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication failed: {0}")]
    Unauthorized(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// A blocking client for a remote language model.
pub trait LlmClient: Send + Sync {
    /// Issue one completion request and return the generated text.
    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Builds an [`LlmClient`] for a user-supplied credential.
pub trait LlmConnector: Send + Sync {
    fn connect(&self, credential: &str) -> crate::Result<Box<dyn LlmClient>>;
}

impl<F> LlmConnector for F
where
    F: Fn(&str) -> crate::Result<Box<dyn LlmClient>> + Send + Sync,
{
    fn connect(&self, credential: &str) -> crate::Result<Box<dyn LlmClient>> {
        self(credential)
    }
}

/// Build the narration prompt for one slide.
pub fn build_prompt(slide_text: &str) -> String {
    format!(
        "Create a professional, engaging presentation script for a slide with the following content:

Slide Content: {slide_text}

Requirements:
- Write in a clear, confident speaking style
- Provide context and explain key points
- Use professional language suitable for business or academic presentations
- Include transitions and highlights
- Aim for about 2-3 sentences per slide"
    )
}

/// Script used when generation fails.
pub fn fallback_script(slide_text: &str) -> String {
    format!("Slide content: {slide_text}")
}

/// Generates one narration script per slide.
///
/// Failures never escape: a failed request yields the fallback script and a
/// [`Notice`], so one bad slide cannot abort the run.
pub struct ScriptGenerator<'a> {
    client: &'a dyn LlmClient,
    max_tokens: u32,
}

impl<'a> ScriptGenerator<'a> {
    pub fn new(client: &'a dyn LlmClient, max_tokens: u32) -> Self {
        Self { client, max_tokens }
    }

    /// Generate the script for slide `slide` (1-based) with a single request.
    pub fn generate(
        &self,
        slide: usize,
        slide_text: &str,
        model: &str,
    ) -> CallOutcome<Script, Infallible> {
        let request = CompletionRequest {
            model: model.to_string(),
            prompt: build_prompt(slide_text),
            max_tokens: self.max_tokens,
        };

        match self.client.complete(&request) {
            Ok(text) => CallOutcome::Ok(Script {
                text,
                fallback: false,
            }),
            Err(e) => {
                log::warn!("Script generation failed for slide {}: {}", slide, e);
                CallOutcome::Degraded {
                    value: Script {
                        text: fallback_script(slide_text),
                        fallback: true,
                    },
                    notice: Notice::new(slide, format!("Error generating script with Claude: {}", e)),
                }
            }
        }
    }
}
