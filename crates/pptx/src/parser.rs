//! PPTX file parser implementation.

use narrator_core::{DocumentParser, Error, Presentation, Result, Shape, ShapeKind, Slide};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

const PRESENTATION_PATH: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PATH: &str = "ppt/_rels/presentation.xml.rels";

/// Parser for PPTX (Office Open XML) files.
pub struct PptxParser;

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a PPTX file from a reader.
    pub fn parse<R: Read + Seek>(&self, reader: R) -> Result<Presentation> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut presentation = Presentation::new();

        for (idx, slide_path) in self.get_slide_order(&mut archive)?.iter().enumerate() {
            let slide = self.parse_slide(&mut archive, slide_path, idx + 1)?;
            presentation.add_slide(slide);
        }

        log::debug!("Parsed {} slides", presentation.len());
        Ok(presentation)
    }

    /// Get the ordered list of slide paths.
    ///
    /// The order comes from the slide id list in `presentation.xml`. When
    /// that part is missing, slides are ordered by the number in their name.
    fn get_slide_order<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
        let rels_content = self.read_file_from_archive(archive, PRESENTATION_RELS_PATH)?;
        let slide_rels = parse_slide_relationships(&rels_content)?;

        let slide_ids = match self.read_file_from_archive(archive, PRESENTATION_PATH) {
            Ok(content) => Some(parse_slide_id_list(&content)?),
            Err(e) => {
                log::warn!("No usable presentation.xml ({}), ordering slides by name", e);
                None
            }
        };

        let order = match slide_ids {
            Some(ids) => ids
                .into_iter()
                .filter_map(|id| {
                    let path = slide_rels.get(&id).cloned();
                    if path.is_none() {
                        log::warn!("Slide relationship '{}' not found, skipping", id);
                    }
                    path
                })
                .collect(),
            None => {
                let mut slides: Vec<String> = slide_rels.into_values().collect();
                slides.sort_by(|a, b| match (extract_slide_number(a), extract_slide_number(b)) {
                    (Some(na), Some(nb)) => na.cmp(&nb),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => a.cmp(b),
                });
                slides
            }
        };

        Ok(order)
    }

    /// Parse a single slide from the archive.
    fn parse_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        slide_number: usize,
    ) -> Result<Slide> {
        let content = self.read_file_from_archive(archive, slide_path)?;
        let mut slide = Slide::new(slide_number);
        for shape in extract_shapes_from_xml(&content)
            .map_err(|e| Error::XmlError(format!("{}: {}", slide_path, e)))?
        {
            slide.add_shape(shape);
        }
        Ok(slide)
    }

    /// Read a file from the ZIP archive.
    fn read_file_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }
}

impl Default for PptxParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for PptxParser {
    fn parse_file(&self, path: &Path) -> Result<Presentation> {
        let file = File::open(path)?;
        self.parse(BufReader::new(file))
    }
}

/// Map relationship ids of slide parts to their archive paths.
fn parse_slide_relationships(xml_content: &str) -> Result<HashMap<String, String>> {
    let mut slides = HashMap::new();
    let mut reader = Reader::from_str(xml_content);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut rel_type = String::new();
                let mut target = String::new();
                let mut id = String::new();

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Type" => rel_type = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Target" => target = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Id" => id = String::from_utf8_lossy(&attr.value).to_string(),
                        _ => {}
                    }
                }

                if rel_type.ends_with("/slide") {
                    slides.insert(id, resolve_target(&target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(slides)
}

/// Relationship ids of the slides listed in `presentation.xml`, in order.
fn parse_slide_id_list(xml_content: &str) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut reader = Reader::from_str(xml_content);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldId" =>
            {
                // The numeric `id` is unprefixed; the relationship id is `r:id`.
                let rel_id = e.attributes().flatten().find_map(|attr| {
                    let key = attr.key.as_ref();
                    (key != b"id" && local_name(key) == b"id")
                        .then(|| String::from_utf8_lossy(&attr.value).to_string())
                });
                if let Some(rel_id) = rel_id {
                    ids.push(rel_id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing presentation.xml: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(ids)
}

/// State of the top-level shape currently being read.
struct OpenShape {
    kind: ShapeKind,
    text: String,
    paragraphs: usize,
}

/// Extract the top-level shapes of a slide in document order.
///
/// Only auto shapes carry text; a shape without a text body has empty text.
/// Shapes nested inside groups are not visited.
fn extract_shapes_from_xml(xml_content: &str) -> std::result::Result<Vec<Shape>, quick_xml::Error> {
    let mut shapes = Vec::new();
    let mut reader = Reader::from_str(xml_content);
    reader.trim_text(false);

    let mut depth = 0usize;
    let mut tree_depth: Option<usize> = None;
    let mut current: Option<OpenShape> = None;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                depth += 1;
                let name = e.name();
                let name = local_name(name.as_ref());

                match tree_depth {
                    None if name == b"spTree" => tree_depth = Some(depth),
                    Some(tree) if depth == tree + 1 => {
                        current = shape_kind(name).map(|kind| OpenShape {
                            kind,
                            text: String::new(),
                            paragraphs: 0,
                        });
                    }
                    Some(_) => {
                        if let Some(shape) = current.as_mut() {
                            handle_text_element(shape, name, &mut in_text);
                        }
                    }
                    None => {}
                }
            }
            Event::Empty(ref e) => {
                let name = e.name();
                let name = local_name(name.as_ref());
                match tree_depth {
                    Some(tree) if depth == tree => {
                        if let Some(kind) = shape_kind(name) {
                            shapes.push(finish_shape(OpenShape {
                                kind,
                                text: String::new(),
                                paragraphs: 0,
                            }));
                        }
                    }
                    Some(_) => {
                        if let Some(shape) = current.as_mut() {
                            handle_empty_text_element(shape, name);
                        }
                    }
                    None => {}
                }
            }
            Event::Text(ref e) => {
                if in_text {
                    if let Some(shape) = current.as_mut() {
                        shape.text.push_str(&e.unescape()?);
                    }
                }
            }
            Event::CData(ref e) => {
                if in_text {
                    if let Some(shape) = current.as_mut() {
                        shape.text.push_str(&String::from_utf8_lossy(e));
                    }
                }
            }
            Event::End(ref e) => {
                let name = e.name();
                let name = local_name(name.as_ref());

                if name == b"t" {
                    in_text = false;
                }
                match tree_depth {
                    Some(tree) if depth == tree + 1 => {
                        if let Some(shape) = current.take() {
                            shapes.push(finish_shape(shape));
                        }
                    }
                    Some(tree) if depth == tree => tree_depth = None,
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(shapes)
}

/// Shape kind of a direct child of the shape tree.
fn shape_kind(name: &[u8]) -> Option<ShapeKind> {
    match name {
        b"sp" => Some(ShapeKind::AutoShape),
        b"pic" => Some(ShapeKind::Picture),
        b"grpSp" => Some(ShapeKind::Group),
        b"graphicFrame" => Some(ShapeKind::GraphicFrame),
        b"cxnSp" => Some(ShapeKind::Connector),
        _ => None,
    }
}

/// Soft line break inside a paragraph, as python-pptx reports `a:br`.
const LINE_BREAK: char = '\u{b}';

fn handle_text_element(shape: &mut OpenShape, name: &[u8], in_text: &mut bool) {
    if shape.kind != ShapeKind::AutoShape {
        return;
    }
    match name {
        b"p" => start_paragraph(shape),
        b"t" => *in_text = true,
        b"br" => shape.text.push(LINE_BREAK),
        _ => {}
    }
}

fn handle_empty_text_element(shape: &mut OpenShape, name: &[u8]) {
    if shape.kind != ShapeKind::AutoShape {
        return;
    }
    match name {
        b"p" => start_paragraph(shape),
        b"br" => shape.text.push(LINE_BREAK),
        _ => {}
    }
}

fn start_paragraph(shape: &mut OpenShape) {
    if shape.paragraphs > 0 {
        shape.text.push('\n');
    }
    shape.paragraphs += 1;
}

fn finish_shape(shape: OpenShape) -> Shape {
    match shape.kind {
        ShapeKind::AutoShape => Shape::with_text(shape.kind, shape.text),
        kind => Shape::without_text(kind),
    }
}

/// Resolve a relationship target relative to the `ppt/` directory.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("ppt/{}", target.trim_start_matches("./")),
    }
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}
