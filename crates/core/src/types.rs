//! Domain types for representing a presentation and its narration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Represents an entire presentation as slides of shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    /// Slides in presentation order.
    pub slides: Vec<Slide>,
}

impl Presentation {
    /// Create an empty presentation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slide to the presentation.
    pub fn add_slide(&mut self, slide: Slide) {
        self.slides.push(slide);
    }

    /// Number of slides.
    pub fn len(&self) -> usize {
        self.slides.len()
    }

    /// Whether the presentation has no slides.
    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }
}

/// The format of an uploaded presentation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationFormat {
    /// Modern PPTX (Office Open XML).
    Pptx,
}

impl PresentationFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pptx" => Some(Self::Pptx),
            _ => None,
        }
    }

    /// Detect format from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        // PPTX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Pptx);
        }
        None
    }

    /// File suffix used for temporary copies of this format.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Pptx => ".pptx",
        }
    }
}

/// A single slide: its shapes in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    /// 1-based slide number.
    pub number: usize,

    /// Top-level shapes in document order.
    pub shapes: Vec<Shape>,
}

impl Slide {
    /// Create a new slide with the given number.
    pub fn new(number: usize) -> Self {
        Self {
            number,
            shapes: Vec::new(),
        }
    }

    /// Add a shape to this slide.
    pub fn add_shape(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }
}

/// The kind of a slide shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    /// Auto shape or text box (`p:sp`).
    AutoShape,
    /// Picture (`p:pic`).
    Picture,
    /// Group of shapes (`p:grpSp`).
    Group,
    /// Table, chart or other graphic frame (`p:graphicFrame`).
    GraphicFrame,
    /// Connector line (`p:cxnSp`).
    Connector,
}

/// A shape on a slide, optionally carrying text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub kind: ShapeKind,

    /// Text of the shape. `None` when the shape kind has no text attribute;
    /// `Some("")` for a text-capable shape that happens to be empty.
    pub text: Option<String>,
}

impl Shape {
    /// A shape that exposes text.
    pub fn with_text(kind: ShapeKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: Some(text.into()),
        }
    }

    /// A shape without a text attribute.
    pub fn without_text(kind: ShapeKind) -> Self {
        Self { kind, text: None }
    }
}

/// An uploaded document as received from the presentation layer.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// Original filename as supplied by the uploader.
    pub filename: String,

    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Detect the document format, preferring magic bytes over the extension.
    pub fn format(&self) -> Option<PresentationFormat> {
        PresentationFormat::from_magic(&self.bytes).or_else(|| {
            self.filename
                .rsplit_once('.')
                .and_then(|(_, ext)| PresentationFormat::from_extension(ext))
        })
    }
}

/// A narration script for one slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub text: String,

    /// Whether this is the fallback used after a failed generation.
    pub fallback: bool,
}

/// One rendered slide: the aligned text, script and audio artifact.
#[derive(Debug, Clone)]
pub struct NarratedSlide<'a> {
    /// 1-based slide number.
    pub number: usize,
    pub slide_text: &'a str,
    pub script: &'a Script,
    pub audio_path: &'a PathBuf,
}
