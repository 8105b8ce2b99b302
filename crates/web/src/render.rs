//! Collects what a run shows to the browser.

use axum::response::sse::Event;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use narrator_core::{Error, NarratedSlide, Notice, RunObserver, RunOutcome, RunState};
use serde::{Deserialize, Serialize};
use std::fs;
use tokio::sync::mpsc::UnboundedSender;

/// How a run ended, as reported to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Completed,
    Aborted,
}

/// One slide as displayed by the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideView {
    pub number: usize,
    pub text: String,
    pub script: String,
    /// Whether the script is the fallback used after a generation failure.
    pub fallback: bool,
    /// Audio as a `data:` URL, when it could be read before cleanup.
    pub audio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeView {
    pub slide: usize,
    pub message: String,
}

impl From<&Notice> for NoticeView {
    fn from(notice: &Notice) -> Self {
        Self {
            slide: notice.slide,
            message: notice.message.clone(),
        }
    }
}

/// Response of `POST /api/narrate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationResponse {
    pub status: RunStatus,
    pub slides: Vec<SlideView>,
    pub notices: Vec<NoticeView>,
    /// Fraction of slides scripted, in `[0, 1]`.
    pub progress: f32,
    pub error: Option<String>,
}

/// Something the page is told while a run is in progress.
#[derive(Debug, Clone)]
pub enum RunEvent {
    State(RunState),
    Progress(f32),
    Notice(NoticeView),
    /// Final event of every run.
    Result(NarrationResponse),
}

impl RunEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::State(_) => "state",
            RunEvent::Progress(_) => "progress",
            RunEvent::Notice(_) => "notice",
            RunEvent::Result(_) => "result",
        }
    }

    /// Encode as a server-sent event whose data is JSON.
    pub fn to_sse(&self) -> Event {
        let data = match self {
            RunEvent::State(state) => serde_json::to_string(&state.to_string()),
            RunEvent::Progress(fraction) => serde_json::to_string(fraction),
            RunEvent::Notice(notice) => serde_json::to_string(notice),
            RunEvent::Result(response) => serde_json::to_string(response),
        };
        match data {
            Ok(json) => Event::default().event(self.name()).data(json),
            Err(e) => {
                log::error!("Failed to encode {} event: {}", self.name(), e);
                Event::default().comment("encoding error")
            }
        }
    }
}

/// Observer that turns a run into a [`NarrationResponse`].
///
/// State changes, progress and notices are forwarded as [`RunEvent`]s when
/// a channel is attached. Audio is read into memory while rendering because
/// the files are removed during cleanup.
#[derive(Debug, Default)]
pub struct WebRenderer {
    events: Option<UnboundedSender<RunEvent>>,
    last_state: Option<RunState>,
    progress: f32,
    notices: Vec<NoticeView>,
    slides: Vec<SlideView>,
    error: Option<String>,
}

impl WebRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward events to `events` as they happen.
    pub fn with_events(events: UnboundedSender<RunEvent>) -> Self {
        Self {
            events: Some(events),
            ..Self::default()
        }
    }

    fn emit(&self, event: RunEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                log::debug!("Event receiver closed, client went away");
            }
        }
    }

    /// Build the response once the run has finished.
    pub fn into_response(self, outcome: &RunOutcome) -> NarrationResponse {
        let status = match outcome {
            RunOutcome::Idle => RunStatus::Idle,
            RunOutcome::Completed(_) => RunStatus::Completed,
            RunOutcome::Aborted { .. } => RunStatus::Aborted,
        };
        log::debug!("Run finished as {:?} (last state {:?})", status, self.last_state);

        NarrationResponse {
            status,
            slides: self.slides,
            notices: self.notices,
            progress: self.progress,
            error: self.error,
        }
    }
}

impl RunObserver for WebRenderer {
    fn on_state(&mut self, state: RunState) {
        self.last_state = Some(state);
        self.emit(RunEvent::State(state));
    }

    fn on_progress(&mut self, fraction: f32) {
        self.progress = fraction.clamp(0.0, 1.0);
        self.emit(RunEvent::Progress(self.progress));
    }

    fn on_notice(&mut self, notice: &Notice) {
        let view = NoticeView::from(notice);
        self.emit(RunEvent::Notice(view.clone()));
        self.notices.push(view);
    }

    fn on_error(&mut self, error: &Error) {
        self.error = Some(format!("An error occurred: {}", error));
    }

    fn render(&mut self, slides: &[NarratedSlide<'_>]) {
        self.slides = slides
            .iter()
            .map(|slide| {
                let audio = match fs::read(slide.audio_path) {
                    Ok(bytes) => Some(format!("data:audio/mpeg;base64,{}", BASE64.encode(bytes))),
                    Err(e) => {
                        log::warn!(
                            "Could not read audio for slide {} from {}: {}",
                            slide.number,
                            slide.audio_path.display(),
                            e
                        );
                        None
                    }
                };
                SlideView {
                    number: slide.number,
                    text: slide.slide_text.to_string(),
                    script: slide.script.text.clone(),
                    fallback: slide.script.fallback,
                    audio,
                }
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use narrator_core::{RunReport, Script};
    use std::path::PathBuf;

    #[test]
    fn test_render_embeds_audio() {
        let dir = tempfile::tempdir().unwrap();
        let audio_path = dir.path().join("slide_1_x.mp3");
        fs::write(&audio_path, b"ID3").unwrap();
        let missing: PathBuf = dir.path().join("slide_2_missing.mp3");

        let scripts = [
            Script {
                text: "Welcome.".to_string(),
                fallback: false,
            },
            Script {
                text: "Slide content: Agenda".to_string(),
                fallback: true,
            },
        ];
        let mut renderer = WebRenderer::new();
        renderer.on_progress(1.0);
        renderer.on_notice(&Notice::new(2, "Error generating script with Claude: timeout"));
        renderer.render(&[
            NarratedSlide {
                number: 1,
                slide_text: "Intro",
                script: &scripts[0],
                audio_path: &audio_path,
            },
            NarratedSlide {
                number: 2,
                slide_text: "Agenda",
                script: &scripts[1],
                audio_path: &missing,
            },
        ]);

        let outcome = RunOutcome::Completed(RunReport {
            slide_texts: vec!["Intro".to_string(), "Agenda".to_string()],
            scripts: scripts.to_vec(),
            notices: vec![],
            cleanup: Default::default(),
        });
        let response = renderer.into_response(&outcome);

        assert_eq!(response.status, RunStatus::Completed);
        assert_eq!(response.progress, 1.0);
        assert_eq!(response.slides.len(), 2);
        assert_eq!(
            response.slides[0].audio.as_deref(),
            Some("data:audio/mpeg;base64,SUQz")
        );
        assert!(response.slides[1].fallback);
        assert!(response.slides[1].audio.is_none());
        assert_eq!(response.notices.len(), 1);
        assert_eq!(response.notices[0].slide, 2);
        assert!(response.error.is_none());
    }

    #[test]
    fn test_aborted_run_reports_error() {
        let mut renderer = WebRenderer::new();
        let error = Error::UnsupportedFormat("notes.txt".to_string());
        renderer.on_error(&error);

        let outcome = RunOutcome::Aborted {
            error,
            notices: vec![],
            cleanup: Default::default(),
        };
        let response = renderer.into_response(&outcome);

        assert_eq!(response.status, RunStatus::Aborted);
        assert!(response.slides.is_empty());
        assert_eq!(
            response.error.as_deref(),
            Some("An error occurred: Unsupported or unrecognized file format: notes.txt")
        );
    }

    #[test]
    fn test_events_forwarded_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut renderer = WebRenderer::with_events(tx);

        renderer.on_state(RunState::Scripting { slide: 1, total: 2 });
        renderer.on_progress(0.5);
        renderer.on_notice(&Notice::new(1, "Error generating script with Claude: timeout"));
        renderer.on_progress(1.5);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        let names: Vec<_> = events.iter().map(RunEvent::name).collect();
        assert_eq!(names, vec!["state", "progress", "notice", "progress"]);
        assert!(matches!(events[0], RunEvent::State(RunState::Scripting { slide: 1, total: 2 })));
        assert!(matches!(events[1], RunEvent::Progress(p) if p == 0.5));
        assert!(matches!(events[3], RunEvent::Progress(p) if p == 1.0));

        let response = renderer.into_response(&RunOutcome::Idle);
        assert_eq!(response.notices.len(), 1);
        assert_eq!(response.progress, 1.0);
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let mut renderer = WebRenderer::with_events(tx);
        renderer.on_progress(0.25);
        assert_eq!(renderer.into_response(&RunOutcome::Idle).progress, 0.25);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Completed).unwrap(),
            "\"completed\""
        );
    }
}
