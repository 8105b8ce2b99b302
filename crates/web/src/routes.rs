//! HTTP handlers.

use crate::render::{RunEvent, WebRenderer};
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use narrator_core::{
    DocumentParser, Language, LlmConnector, Pipeline, RunRequest, TtsClient, UploadedDocument,
    VOICE_SELECTION,
};
use narrator_pptx::PptxParser;
use narrator_remote::{AnthropicConnector, GoogleTts};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};

pub type NarrationPipeline = Pipeline<PptxParser, AnthropicConnector, GoogleTts>;

const INDEX_HTML: &str = include_str!("index.html");

pub struct AppState<P, C, T> {
    pub pipeline: Arc<Pipeline<P, C, T>>,
}

impl<P, C, T> Clone for AppState<P, C, T> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

pub fn router<P, C, T>(state: AppState<P, C, T>, max_upload_bytes: usize) -> Router
where
    P: DocumentParser + 'static,
    C: LlmConnector + 'static,
    T: TtsClient + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/api/languages", get(languages))
        .route("/api/narrate", post(narrate::<P, C, T>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Error returned to the page as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn from_multipart(e: MultipartError) -> Self {
        Self {
            status: e.status(),
            message: format!("Invalid form data: {}", e.body_text()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: &self.message,
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct LanguageView {
    pub name: &'static str,
    pub code: &'static str,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn languages() -> Json<Vec<LanguageView>> {
    Json(
        VOICE_SELECTION
            .entries()
            .map(|(name, code)| LanguageView { name, code })
            .collect(),
    )
}

/// Fields of the narration form. Missing fields stay `None`.
#[derive(Debug, Default)]
pub struct NarrationForm {
    pub api_key: Option<String>,
    pub language: Option<String>,
    pub file: Option<UploadedDocument>,
}

impl NarrationForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(ApiError::from_multipart)?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "api_key" => form.api_key = Some(read_text(field).await?),
                "language" => form.language = Some(read_text(field).await?),
                "file" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(ApiError::from_multipart)?;
                    // Browsers send an empty part when no file was chosen.
                    if !filename.is_empty() || !bytes.is_empty() {
                        form.file = Some(UploadedDocument::new(filename, bytes.to_vec()));
                    }
                }
                other => log::debug!("Ignoring form field {:?}", other),
            }
        }
        Ok(form)
    }

    /// Turn the form into a run request. An unknown language is rejected.
    pub fn into_request(self) -> Result<RunRequest, ApiError> {
        let language = match self.language.as_deref().map(str::trim) {
            None | Some("") => Language::default(),
            Some(value) => value
                .parse::<Language>()
                .map_err(|e| ApiError::bad_request(e.to_string()))?,
        };
        Ok(RunRequest::new(self.api_key, self.file, language))
    }
}

async fn read_text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(ApiError::from_multipart)
}

/// Run the pipeline and stream its events. The last event is always `result`.
async fn narrate<P, C, T>(
    State(state): State<AppState<P, C, T>>,
    multipart: Multipart,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send>, ApiError>
where
    P: DocumentParser + 'static,
    C: LlmConnector + 'static,
    T: TtsClient + 'static,
{
    let request = NarrationForm::read(multipart).await?.into_request()?;
    if let Some(document) = &request.document {
        log::info!(
            "Narrating {} ({} bytes) in {}",
            document.filename,
            document.bytes.len(),
            request.language
        );
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let pipeline = Arc::clone(&state.pipeline);
    let task = tokio::task::spawn_blocking(move || {
        let mut renderer = WebRenderer::with_events(tx.clone());
        let outcome = pipeline.run(request, &mut renderer);
        let response = renderer.into_response(&outcome);
        if tx.send(RunEvent::Result(response)).is_err() {
            log::debug!("Client went away before the result was sent");
        }
    });
    tokio::spawn(async move {
        if let Err(e) = task.await {
            log::error!("Narration task failed: {}", e);
        }
    });

    let events = UnboundedReceiverStream::new(rx).map(|event| Ok(event.to_sse()));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use narrator_core::{
        CompletionRequest, LlmClient, LlmError, NarratorConfig, Presentation, Shape, ShapeKind,
        Slide, TtsError,
    };
    use serde_json::Value;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    const BOUNDARY: &str = "narrator-test-boundary";
    const DECK: &[u8] = b"PK\x03\x04deck";

    struct FixedParser;

    impl DocumentParser for FixedParser {
        fn parse_file(&self, _path: &Path) -> narrator_core::Result<Presentation> {
            let mut presentation = Presentation::new();
            for (idx, text) in ["Intro", "Outro"].into_iter().enumerate() {
                let mut slide = Slide::new(idx + 1);
                slide.add_shape(Shape::with_text(ShapeKind::AutoShape, text));
                presentation.add_slide(slide);
            }
            Ok(presentation)
        }
    }

    struct EchoLlm;

    impl LlmClient for EchoLlm {
        fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
            Ok(format!("Narration ({} chars of prompt)", request.prompt.len()))
        }
    }

    struct FakeTts;

    impl TtsClient for FakeTts {
        fn synthesize(&self, _text: &str, language_code: &str) -> Result<Vec<u8>, TtsError> {
            assert_eq!(language_code, "fr");
            Ok(b"ID3".to_vec())
        }
    }

    fn test_app(dir: &Path, connects: Arc<AtomicUsize>, max_upload_bytes: usize) -> Router {
        let connector = move |_credential: &str| -> narrator_core::Result<Box<dyn LlmClient>> {
            connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(EchoLlm))
        };
        let pipeline = Pipeline::new(
            FixedParser,
            connector,
            FakeTts,
            NarratorConfig::new().with_temp_dir(dir),
        );
        router(
            AppState {
                pipeline: Arc::new(pipeline),
            },
            max_upload_bytes,
        )
    }

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a [u8]),
    }

    fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                            name, value
                        )
                        .as_bytes(),
                    );
                }
                Part::File(filename, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n",
                            filename
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/narrate")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    /// Split a server-sent event body into `(event, data)` pairs.
    fn sse_events(body: &str) -> Vec<(String, Value)> {
        body.split("\n\n")
            .filter_map(|block| {
                let mut name = None;
                let mut data = None;
                for line in block.lines() {
                    if let Some(value) = line.strip_prefix("event:") {
                        name = Some(value.trim().to_string());
                    } else if let Some(value) = line.strip_prefix("data:") {
                        data = Some(serde_json::from_str(value.trim_start()).unwrap());
                    }
                }
                Some((name?, data?))
            })
            .collect()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_form_defaults_to_english() {
        let request = NarrationForm::default().into_request().unwrap();
        assert_eq!(request.language, Language::EnglishUs);
        assert!(request.credential.is_none());
        assert!(request.document.is_none());
    }

    #[test]
    fn test_form_accepts_name_or_code() {
        let form = NarrationForm {
            api_key: Some("sk-test".to_string()),
            language: Some(" Spanish ".to_string()),
            file: Some(UploadedDocument::new("deck.pptx", vec![1, 2, 3])),
        };
        let request = form.into_request().unwrap();
        assert_eq!(request.language, Language::Spanish);
        assert_eq!(request.credential.as_deref(), Some("sk-test"));
        assert_eq!(request.document.unwrap().filename, "deck.pptx");

        let form = NarrationForm {
            language: Some("de".to_string()),
            ..Default::default()
        };
        assert_eq!(form.into_request().unwrap().language, Language::German);
    }

    #[tokio::test]
    async fn test_narrate_streams_progress_then_result() {
        let dir = tempfile::tempdir().unwrap();
        let connects = Arc::new(AtomicUsize::new(0));
        let app = test_app(dir.path(), Arc::clone(&connects), 1024 * 1024);

        let response = app
            .oneshot(multipart_request(&[
                Part::Text("api_key", "sk-test"),
                Part::Text("language", "French"),
                Part::File("deck.pptx", DECK),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));
        let events = sse_events(&body_text(response).await);

        let progress: Vec<f64> = events
            .iter()
            .filter(|(name, _)| name == "progress")
            .map(|(_, data)| data.as_f64().unwrap())
            .collect();
        assert_eq!(progress, vec![0.5, 1.0]);
        assert!(events
            .iter()
            .any(|(name, data)| name == "state" && data == "scripting 2/2"));

        let (name, result) = events.last().unwrap();
        assert_eq!(name, "result");
        assert_eq!(result["status"], "completed");
        assert_eq!(result["slides"].as_array().unwrap().len(), 2);
        assert_eq!(result["slides"][1]["text"], "Outro");
        assert_eq!(result["slides"][0]["audio"], "data:audio/mpeg;base64,SUQz");
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_narrate_without_api_key_is_idle() {
        let dir = tempfile::tempdir().unwrap();
        let connects = Arc::new(AtomicUsize::new(0));
        let app = test_app(dir.path(), Arc::clone(&connects), 1024 * 1024);

        let response = app
            .oneshot(multipart_request(&[
                Part::Text("language", "French"),
                Part::File("deck.pptx", DECK),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let events = sse_events(&body_text(response).await);
        assert!(events.iter().all(|(name, _)| name != "progress"));
        let (name, result) = events.last().unwrap();
        assert_eq!(name, "result");
        assert_eq!(result["status"], "idle");
        assert!(result["slides"].as_array().unwrap().is_empty());
        assert_eq!(connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_narrate_empty_file_part_is_idle() {
        let dir = tempfile::tempdir().unwrap();
        let connects = Arc::new(AtomicUsize::new(0));
        let app = test_app(dir.path(), Arc::clone(&connects), 1024 * 1024);

        let response = app
            .oneshot(multipart_request(&[
                Part::Text("api_key", "sk-test"),
                Part::Text("language", "fr"),
                Part::File("", b""),
            ]))
            .await
            .unwrap();

        let events = sse_events(&body_text(response).await);
        let (_, result) = events.last().unwrap();
        assert_eq!(result["status"], "idle");
        assert_eq!(connects.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_narrate_rejects_unknown_language() {
        let dir = tempfile::tempdir().unwrap();
        let connects = Arc::new(AtomicUsize::new(0));
        let app = test_app(dir.path(), Arc::clone(&connects), 1024 * 1024);

        let response = app
            .oneshot(multipart_request(&[
                Part::Text("api_key", "sk-test"),
                Part::Text("language", "Klingon"),
                Part::File("deck.pptx", DECK),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"], "unknown language 'Klingon'");
        assert_eq!(connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_narrate_rejects_oversized_upload() {
        let dir = tempfile::tempdir().unwrap();
        let connects = Arc::new(AtomicUsize::new(0));
        let app = test_app(dir.path(), Arc::clone(&connects), 512);
        let deck = [DECK, &[0u8; 4096][..]].concat();

        let response = app
            .oneshot(multipart_request(&[
                Part::Text("api_key", "sk-test"),
                Part::File("deck.pptx", &deck),
            ]))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("Invalid form data"));
        assert_eq!(connects.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_languages_lists_voice_selection() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), Arc::new(AtomicUsize::new(0)), 1024);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/languages")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let list: Value = serde_json::from_str(&body_text(response).await).unwrap();
        let list = list.as_array().unwrap();
        assert_eq!(list.len(), Language::ALL.len());
        assert_eq!(list[0]["name"], "English (US)");
        assert_eq!(list[0]["code"], "en");
    }

    #[tokio::test]
    async fn test_index_page_has_form_fields() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), Arc::new(AtomicUsize::new(0)), 1024);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let page = body_text(response).await;
        for field in ["name=\"api_key\"", "name=\"language\"", "name=\"file\""] {
            assert!(page.contains(field), "missing {}", field);
        }
    }
}
