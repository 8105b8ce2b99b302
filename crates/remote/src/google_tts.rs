//! Google Translate text-to-speech client.
//!
//! The endpoint accepts at most 100 characters per request, so text is split
//! at punctuation and whitespace and the MP3 chunks are concatenated.

use narrator_core::{TtsClient, TtsError, VOICE_SELECTION};
use regex::Regex;
use reqwest::blocking::Client;
use std::sync::LazyLock;
use std::time::Duration;

/// Public Google Translate endpoint.
pub const DEFAULT_BASE_URL: &str = "https://translate.google.com";

/// Longest text accepted by one request, in characters.
pub const MAX_CHUNK_CHARS: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// A run of text followed by its punctuation, or punctuation alone.
static SPEECH_PIECE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^.!?;:,\n¿¡。！？；：，、]+[.!?;:,\n¿¡。！？；：，、]*|[.!?;:,\n¿¡。！？；：，、]+")
        .unwrap()
});

/// Blocking client for `GET /translate_tts`.
pub struct GoogleTts {
    http: Client,
    base_url: String,
}

impl GoogleTts {
    /// Create a client for the public endpoint.
    pub fn new() -> Result<Self, TtsError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TtsError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at another endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn fetch_chunk(
        &self,
        chunk: &str,
        language_code: &str,
        idx: usize,
        total: usize,
    ) -> Result<Vec<u8>, TtsError> {
        let total = total.to_string();
        let idx = idx.to_string();
        let textlen = chunk.chars().count().to_string();

        let response = self
            .http
            .get(format!("{}/translate_tts", self.base_url))
            .query(&[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", language_code),
                ("client", "tw-ob"),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .map_err(|e| TtsError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(TtsError::Service {
                status: status.as_u16(),
                message: message.trim().chars().take(200).collect(),
            });
        }

        let bytes = response
            .bytes()
            .map_err(|e| TtsError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl TtsClient for GoogleTts {
    fn synthesize(&self, text: &str, language_code: &str) -> Result<Vec<u8>, TtsError> {
        if !VOICE_SELECTION
            .options()
            .iter()
            .any(|l| l.code() == language_code)
        {
            return Err(TtsError::UnsupportedLanguage(language_code.to_string()));
        }

        let chunks = split_for_speech(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(TtsError::EmptyText);
        }

        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            log::debug!("TTS chunk {}/{} ({} chars)", idx + 1, chunks.len(), chunk.len());
            audio.extend(self.fetch_chunk(chunk, language_code, idx, chunks.len())?);
        }
        Ok(audio)
    }
}

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Splits prefer punctuation, then whitespace; single words longer than the
/// limit are cut. Pieces without any alphanumeric character are dropped.
pub fn split_for_speech(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for piece in SPEECH_PIECE_REGEX.find_iter(text).map(|m| m.as_str().trim()) {
        if !piece.chars().any(char::is_alphanumeric) {
            continue;
        }
        for part in fit_piece(piece, max_chars) {
            let needed = current.chars().count() + 1 + part.chars().count();
            if current.is_empty() {
                current = part;
            } else if needed <= max_chars {
                current.push(' ');
                current.push_str(&part);
            } else {
                chunks.push(std::mem::replace(&mut current, part));
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Break one piece at whitespace so every part fits in `max_chars`.
fn fit_piece(piece: &str, max_chars: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for word in piece.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max_chars {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            parts.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }

        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            parts.push(std::mem::replace(&mut current, word.to_string()));
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
