//! End-to-end narration of one uploaded presentation.
//!
//! A run moves through [`RunState`]s:
//!
//! ```text
//! Idle -> AwaitingInput -> Extracting -> Scripting(i) -> Synthesizing
//!      -> Rendering -> Cleanup -> Idle
//! ```
//!
//! Any fatal error moves the run to `Aborted`, after which `Cleanup` still
//! runs. Every file the run created is removed before [`Pipeline::run`]
//! returns.

use crate::artifacts::{CleanupReport, RunArtifacts};
use crate::audio::{AudioSynthesizer, TtsClient};
use crate::config::NarratorConfig;
use crate::extract::{self, DocumentParser};
use crate::outcome::Notice;
use crate::script::{LlmConnector, ScriptGenerator};
use crate::types::{NarratedSlide, Script, UploadedDocument};
use crate::voice::Language;
use crate::{Error, Result};
use std::fmt;
use std::path::PathBuf;

/// States of a narration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    AwaitingInput,
    Extracting,
    /// Generating the script of slide `slide` (1-based) out of `total`.
    Scripting { slide: usize, total: usize },
    Synthesizing,
    Rendering,
    Cleanup,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::AwaitingInput => f.write_str("awaiting input"),
            RunState::Extracting => f.write_str("extracting"),
            RunState::Scripting { slide, total } => write!(f, "scripting {}/{}", slide, total),
            RunState::Synthesizing => f.write_str("synthesizing"),
            RunState::Rendering => f.write_str("rendering"),
            RunState::Cleanup => f.write_str("cleanup"),
            RunState::Aborted => f.write_str("aborted"),
        }
    }
}

/// The presentation layer as seen by the pipeline.
///
/// Everything except [`RunObserver::render`] is optional.
pub trait RunObserver {
    fn on_state(&mut self, _state: RunState) {}

    /// Fraction of slides scripted so far, in `[0, 1]`.
    fn on_progress(&mut self, _fraction: f32) {}

    /// A slide fell back to its default script.
    fn on_notice(&mut self, _notice: &Notice) {}

    /// The run is being aborted with this error.
    fn on_error(&mut self, _error: &Error) {}

    /// Display the narrated slides. Audio files are deleted once this returns.
    fn render(&mut self, slides: &[NarratedSlide<'_>]);
}

/// Input of one run as collected by the presentation layer.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub credential: Option<String>,
    pub document: Option<UploadedDocument>,
    pub language: Language,
}

impl RunRequest {
    pub fn new(
        credential: Option<String>,
        document: Option<UploadedDocument>,
        language: Language,
    ) -> Self {
        Self {
            credential,
            document,
            language,
        }
    }

    /// Credential and document, if both are present.
    fn ready(self) -> Option<(String, UploadedDocument)> {
        let credential = self.credential.filter(|c| !c.trim().is_empty())?;
        let document = self.document?;
        Some((credential, document))
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Text of each slide.
    pub slide_texts: Vec<String>,
    /// Script of each slide, aligned with `slide_texts`.
    pub scripts: Vec<Script>,
    pub notices: Vec<Notice>,
    pub cleanup: CleanupReport,
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Credential or document was missing; nothing was started.
    Idle,
    /// The run reached rendering.
    Completed(RunReport),
    /// The run stopped on a fatal error.
    Aborted {
        error: Error,
        notices: Vec<Notice>,
        cleanup: CleanupReport,
    },
}

impl RunOutcome {
    pub fn is_idle(&self) -> bool {
        matches!(self, RunOutcome::Idle)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, RunOutcome::Aborted { .. })
    }
}

/// Sequences extraction, scripting and synthesis for one document.
pub struct Pipeline<P, C, T> {
    parser: P,
    connector: C,
    tts: T,
    config: NarratorConfig,
}

impl<P, C, T> Pipeline<P, C, T>
where
    P: DocumentParser,
    C: LlmConnector,
    T: TtsClient,
{
    pub fn new(parser: P, connector: C, tts: T, config: NarratorConfig) -> Self {
        Self {
            parser,
            connector,
            tts,
            config,
        }
    }

    pub fn config(&self) -> &NarratorConfig {
        &self.config
    }

    /// Run the whole pipeline for one request.
    ///
    /// Returns [`RunOutcome::Idle`] without doing any work unless both a
    /// credential and a document are present.
    pub fn run(&self, request: RunRequest, observer: &mut dyn RunObserver) -> RunOutcome {
        let language = request.language;
        let Some((credential, document)) = request.ready() else {
            log::debug!("Credential or document missing, staying idle");
            transition(observer, RunState::Idle);
            return RunOutcome::Idle;
        };

        transition(observer, RunState::AwaitingInput);
        log::info!(
            "Narrating '{}' ({} bytes) in {}",
            document.filename,
            document.bytes.len(),
            language
        );

        let mut artifacts = RunArtifacts::new();
        let mut notices = Vec::new();
        let result = self.execute(
            &credential,
            &document,
            language,
            &mut artifacts,
            &mut notices,
            observer,
        );

        if let Err(ref error) = result {
            log::error!("Narration aborted: {}", error);
            transition(observer, RunState::Aborted);
            observer.on_error(error);
        }

        transition(observer, RunState::Cleanup);
        let cleanup = artifacts.cleanup();
        if cleanup.failed > 0 {
            log::warn!("{} temporary files could not be removed", cleanup.failed);
        }
        transition(observer, RunState::Idle);

        match result {
            Ok((slide_texts, scripts)) => RunOutcome::Completed(RunReport {
                slide_texts,
                scripts,
                notices,
                cleanup,
            }),
            Err(error) => RunOutcome::Aborted {
                error,
                notices,
                cleanup,
            },
        }
    }

    fn execute(
        &self,
        credential: &str,
        document: &UploadedDocument,
        language: Language,
        artifacts: &mut RunArtifacts,
        notices: &mut Vec<Notice>,
        observer: &mut dyn RunObserver,
    ) -> Result<(Vec<String>, Vec<Script>)> {
        let format = document
            .format()
            .ok_or_else(|| Error::UnsupportedFormat(document.filename.clone()))?;
        let client = self.connector.connect(credential)?;
        let input = artifacts.store_input(&self.config.temp_dir, document, format.suffix())?;

        transition(observer, RunState::Extracting);
        let presentation = self.parser.parse_file(&input)?;
        let slide_texts = extract::extract(&presentation);
        log::debug!("Extracted text from {} slides", slide_texts.len());

        let total = slide_texts.len();
        let generator = ScriptGenerator::new(client.as_ref(), self.config.max_tokens);
        let mut scripts = Vec::with_capacity(total);
        if total == 0 {
            observer.on_progress(1.0);
        }
        for (idx, text) in slide_texts.iter().enumerate() {
            let slide = idx + 1;
            transition(observer, RunState::Scripting { slide, total });
            let (script, notice) = match generator
                .generate(slide, text, &self.config.model)
                .into_result()
            {
                Ok(generated) => generated,
                Err(never) => match never {},
            };
            if let Some(notice) = notice {
                observer.on_notice(&notice);
                notices.push(notice);
            }
            scripts.push(script);
            observer.on_progress(slide as f32 / total as f32);
        }

        transition(observer, RunState::Synthesizing);
        let synthesizer = AudioSynthesizer::new(&self.tts, &self.config.temp_dir);
        let audio_paths = synthesizer.synthesize(&scripts, language.code(), artifacts)?;

        transition(observer, RunState::Rendering);
        render(observer, &slide_texts, &scripts, &audio_paths);

        Ok((slide_texts, scripts))
    }
}

fn transition(observer: &mut dyn RunObserver, state: RunState) {
    log::debug!("Run state: {}", state);
    observer.on_state(state);
}

fn render(
    observer: &mut dyn RunObserver,
    slide_texts: &[String],
    scripts: &[Script],
    audio_paths: &[PathBuf],
) {
    let slides: Vec<NarratedSlide<'_>> = slide_texts
        .iter()
        .zip(scripts)
        .zip(audio_paths)
        .enumerate()
        .map(|(idx, ((text, script), audio_path))| NarratedSlide {
            number: idx + 1,
            slide_text: text,
            script,
            audio_path,
        })
        .collect();
    observer.render(&slides);
}
