//! Error types for the narration pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can end a narration run.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a temporary file.
    #[error("File system error: {0}")]
    IoError(#[from] std::io::Error),

    /// The uploaded document is not a PPTX container.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// Failed to parse the PPTX file structure.
    #[error("PPTX parsing error: {0}")]
    PptxParseError(String),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for PPTX).
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// The language model client could not be set up for this credential.
    #[error("Failed to connect to the language model: {0}")]
    LlmConnect(String),

    /// Text-to-speech failed for one slide.
    #[error("Audio synthesis failed for slide {slide}: {source}")]
    Synthesis {
        /// 1-based slide number.
        slide: usize,
        #[source]
        source: crate::audio::TtsError,
    },

    /// Writing a synthesized audio file failed.
    #[error("Failed to write audio for slide {slide}: {source}")]
    AudioWrite {
        /// 1-based slide number.
        slide: usize,
        #[source]
        source: std::io::Error,
    },
}
