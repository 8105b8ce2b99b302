//! PPTX (Office Open XML) document parser for slide narration.
//!
//! Parses .pptx files, which are ZIP archives containing XML documents,
//! into slides of shapes.

pub mod parser;

pub use parser::PptxParser;
