//! Core domain types, slide text extraction, script generation, audio
//! synthesis and the narration pipeline.

pub mod artifacts;
pub mod audio;
pub mod config;
pub mod error;
pub mod extract;
pub mod outcome;
pub mod pipeline;
pub mod script;
pub mod types;
pub mod voice;

pub use artifacts::{CleanupReport, RunArtifacts};
pub use audio::{AudioSynthesizer, TtsClient, TtsError};
pub use config::NarratorConfig;
pub use error::{Error, Result};
pub use extract::{extract, DocumentParser};
pub use outcome::{CallOutcome, Notice};
pub use pipeline::{Pipeline, RunObserver, RunOutcome, RunReport, RunRequest, RunState};
pub use script::{CompletionRequest, LlmClient, LlmConnector, LlmError, ScriptGenerator};
pub use types::{
    NarratedSlide, Presentation, PresentationFormat, Script, Shape, ShapeKind, Slide,
    UploadedDocument,
};
pub use voice::{Language, VOICE_SELECTION};
