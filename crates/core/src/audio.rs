//! Audio synthesis: one uniquely named audio file per script.

use crate::artifacts::RunArtifacts;
use crate::types::Script;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Extension of synthesized audio files.
pub const AUDIO_EXTENSION: &str = "mp3";

/// Errors reported by a text-to-speech client.
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("no text to speak")]
    EmptyText,
    #[error("unsupported language '{0}'")]
    UnsupportedLanguage(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("service returned {status}: {message}")]
    Service { status: u16, message: String },
}

/// A blocking client for a remote text-to-speech service.
pub trait TtsClient: Send + Sync {
    /// Synthesize `text` spoken in `language_code` and return the audio bytes.
    fn synthesize(&self, text: &str, language_code: &str) -> std::result::Result<Vec<u8>, TtsError>;
}

/// Unique audio filename for the 1-based slide `index`.
pub fn audio_filename(index: usize) -> String {
    format!("slide_{}_{}.{}", index, Uuid::new_v4(), AUDIO_EXTENSION)
}

/// Writes one audio file per script into a temp directory.
pub struct AudioSynthesizer<'a> {
    client: &'a dyn TtsClient,
    dir: &'a Path,
}

impl<'a> AudioSynthesizer<'a> {
    pub fn new(client: &'a dyn TtsClient, dir: &'a Path) -> Self {
        Self { client, dir }
    }

    /// Synthesize every script in order.
    ///
    /// Each path is registered with `artifacts` before its file is created.
    /// The first failure stops synthesis and is returned.
    pub fn synthesize(
        &self,
        scripts: &[Script],
        language_code: &str,
        artifacts: &mut RunArtifacts,
    ) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(scripts.len());
        for (idx, script) in scripts.iter().enumerate() {
            paths.push(self.synthesize_one(idx + 1, &script.text, language_code, artifacts)?);
        }
        Ok(paths)
    }

    /// Synthesize the script of slide `slide` (1-based) to a new file.
    ///
    /// Audio has no degraded form: any failure is an error.
    pub fn synthesize_one(
        &self,
        slide: usize,
        text: &str,
        language_code: &str,
        artifacts: &mut RunArtifacts,
    ) -> Result<PathBuf> {
        let path = self.dir.join(audio_filename(slide));
        artifacts.track_audio(path.clone());

        let audio = self
            .client
            .synthesize(text, language_code)
            .map_err(|source| Error::Synthesis { slide, source })?;
        fs::write(&path, &audio).map_err(|source| Error::AudioWrite { slide, source })?;

        log::debug!(
            "Wrote {} bytes of audio for slide {} to {}",
            audio.len(),
            slide,
            path.display()
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeTts {
        calls: Mutex<Vec<(String, String)>>,
        fail_on: Option<usize>,
    }

    impl TtsClient for FakeTts {
        fn synthesize(&self, text: &str, language_code: &str) -> std::result::Result<Vec<u8>, TtsError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push((text.to_string(), language_code.to_string()));
            if self.fail_on == Some(calls.len()) {
                return Err(TtsError::Network("connection reset".to_string()));
            }
            Ok(format!("audio:{}", text).into_bytes())
        }
    }

    fn scripts(texts: &[&str]) -> Vec<Script> {
        texts
            .iter()
            .map(|t| Script {
                text: t.to_string(),
                fallback: false,
            })
            .collect()
    }

    #[test]
    fn test_audio_filename_is_unique() {
        let a = audio_filename(1);
        let b = audio_filename(1);
        assert_ne!(a, b);
        assert!(a.starts_with("slide_1_"));
        assert!(a.ends_with(".mp3"));
    }

    #[test]
    fn test_synthesize_aligned_paths() {
        let dir = tempfile::tempdir().unwrap();
        let tts = FakeTts {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
        };
        let synthesizer = AudioSynthesizer::new(&tts, dir.path());
        let mut artifacts = RunArtifacts::new();

        let paths = synthesizer
            .synthesize(&scripts(&["one", "two"]), "fr", &mut artifacts)
            .unwrap();

        assert_eq!(paths.len(), 2);
        assert_eq!(fs::read(&paths[0]).unwrap(), b"audio:one");
        assert_eq!(fs::read(&paths[1]).unwrap(), b"audio:two");
        assert!(paths[1]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("slide_2_"));
        assert_eq!(artifacts.audio_paths(), paths.as_slice());
        assert_eq!(
            *tts.calls.lock().unwrap(),
            vec![
                ("one".to_string(), "fr".to_string()),
                ("two".to_string(), "fr".to_string())
            ]
        );

        artifacts.cleanup();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_synthesize_propagates_failure() {
        let dir = tempfile::tempdir().unwrap();
        let tts = FakeTts {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(2),
        };
        let synthesizer = AudioSynthesizer::new(&tts, dir.path());
        let mut artifacts = RunArtifacts::new();

        let err = synthesizer
            .synthesize(&scripts(&["one", "two", "three"]), "en", &mut artifacts)
            .unwrap_err();
        assert!(matches!(err, Error::Synthesis { slide: 2, .. }));
        assert_eq!(tts.calls.lock().unwrap().len(), 2);
        assert_eq!(artifacts.audio_paths().len(), 2);

        artifacts.cleanup();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_synthesize_one_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let tts = FakeTts {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
        };
        let synthesizer = AudioSynthesizer::new(&tts, &missing);
        let mut artifacts = RunArtifacts::new();

        let err = synthesizer
            .synthesize_one(3, "hello", "en", &mut artifacts)
            .unwrap_err();
        assert!(matches!(err, Error::AudioWrite { slide: 3, .. }));
        assert_eq!(artifacts.audio_paths().len(), 1);
        assert_eq!(artifacts.cleanup(), crate::artifacts::CleanupReport::default());
    }
}
