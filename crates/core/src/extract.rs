//! Slide text extraction.
//!
//! Turns a parsed [`Presentation`] into one plain-text string per slide.

use crate::types::{Presentation, Slide};
use crate::Result;
use std::path::Path;

/// Parses a presentation file into slides and shapes.
pub trait DocumentParser: Send + Sync {
    /// Parse the document stored at `path`.
    fn parse_file(&self, path: &Path) -> Result<Presentation>;
}

/// Extracts the text of every slide, one entry per slide.
///
/// The output always has exactly one entry per slide so later stages stay
/// index-aligned; slides without text yield an empty string.
pub fn extract(presentation: &Presentation) -> Vec<String> {
    presentation.slides.iter().map(slide_text).collect()
}

/// Join the texts of all text-bearing shapes with a single space.
pub fn slide_text(slide: &Slide) -> String {
    slide
        .shapes
        .iter()
        .filter_map(|shape| shape.text.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
}
