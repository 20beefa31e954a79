// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Package reader — parses `word/document.xml` into the content tree and the
// skeleton of markup that surrounds each paragraph's runs.
//
// Element names are matched with the conventional `w:` prefix.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};
use std::sync::Arc;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, trace};
use zip::ZipArchive;
use zip::result::ZipError;

use super::{
    Chunk, DOCUMENT_PART, DocxError, IMAGE_RELATIONSHIP, RELATIONSHIPS_PART, Skeleton,
};
use crate::media::MediaId;
use crate::model::{
    Block, Color, Distance, Document, Drawing, Extent, Paragraph, Placement, Run, RunContent,
    RunProperties, Table, TableCell, TableRow, TextFragment,
};

/// One entry of a relationships part.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Relationship {
    pub id: String,
    pub kind: String,
    pub target: String,
    pub external: bool,
}

/// Parse the tree and skeleton out of a complete package.
pub(crate) fn read_package(package: &[u8]) -> Result<(Document, Skeleton), DocxError> {
    let mut archive = ZipArchive::new(Cursor::new(package))?;
    let xml = read_part(&mut archive, DOCUMENT_PART)?
        .ok_or_else(|| DocxError::Malformed(format!("package has no {DOCUMENT_PART}")))?;
    let relationships = match read_part(&mut archive, RELATIONSHIPS_PART)? {
        Some(rels) => parse_relationships(&rels)?,
        None => Vec::new(),
    };

    // Image relationships whose part is present; only these can back a drawing.
    let images: HashMap<String, String> = relationships
        .into_iter()
        .filter(|rel| rel.kind == IMAGE_RELATIONSHIP && !rel.external)
        .filter_map(|rel| {
            let part = resolve_target(&rel.target);
            archive.index_for_name(&part).map(|_| (rel.id, part))
        })
        .collect();

    let mut body = BodyReader::new(&xml, &images);
    body.read()?;
    let BodyReader {
        mut document,
        chunks,
        referenced,
        ..
    } = body;

    let mut existing_media = HashSet::new();
    for id in referenced {
        let Some(part) = images.get(&id) else {
            continue;
        };
        let Some(bytes) = read_part_bytes(&mut archive, part)? else {
            continue;
        };
        let content_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        let id = MediaId(id);
        document.media.insert_part(id.clone(), content_type, bytes);
        existing_media.insert(id);
    }

    let skeleton = Skeleton {
        chunks,
        max_drawing_id: max_drawing_id(&xml)?,
        existing_media,
    };
    debug!(
        media = skeleton.existing_media.len(),
        max_drawing_id = skeleton.max_drawing_id,
        "Document part parsed"
    );
    Ok((document, skeleton))
}

/// Text of a package part, or `None` when the package lacks it.
pub(crate) fn read_part<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, DocxError> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut text = String::new();
            file.read_to_string(&mut text)?;
            Ok(Some(text))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn read_part_bytes<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, DocxError> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)?;
            Ok(Some(bytes))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub(crate) fn parse_relationships(xml: &str) -> Result<Vec<Relationship>, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let attrs = attributes(&e)?;
                let get = |key: &str| {
                    attrs
                        .iter()
                        .find(|(name, _)| name == key)
                        .map(|(_, value)| value.clone())
                        .unwrap_or_default()
                };
                out.push(Relationship {
                    id: get("Id"),
                    kind: get("Type"),
                    target: get("Target"),
                    external: get("TargetMode") == "External",
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Part name of a relationship target given relative to `word/`.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{target}"),
    }
}

/// Highest `docPr` id anywhere in the part.
fn max_drawing_id(xml: &str) -> Result<u64, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut max = 0;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"docPr" => {
                let id = attributes(&e)?
                    .into_iter()
                    .find(|(name, _)| name == "id")
                    .and_then(|(_, value)| value.parse().ok())
                    .unwrap_or(0);
                max = max.max(id);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(max)
}

/// Attributes of an element as (local name, unescaped value) pairs.
pub(crate) fn attributes(element: &BytesStart<'_>) -> Result<Vec<(String, String)>, DocxError> {
    let mut out = Vec::new();
    for attr in element.attributes() {
        let attr = attr?;
        let name = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        out.push((name, value));
    }
    Ok(out)
}

/// Open element on the way down through the body.
enum Frame {
    Body(Vec<Block>),
    Table(Table),
    Row(TableRow),
    Cell(TableCell),
}

/// What the innermost open frame accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    /// Body or table cell: paragraphs, tables and other blocks.
    Container,
    Table,
    Row,
}

struct BodyReader<'x> {
    xml: &'x str,
    reader: Reader<&'x [u8]>,
    images: &'x HashMap<String, String>,
    document: Document,
    chunks: Vec<Chunk>,
    /// Start of the markup not yet moved into `chunks`.
    markup_start: usize,
    frames: Vec<Frame>,
    /// Relationship ids of the pictures read as drawings.
    referenced: HashSet<String>,
}

impl<'x> BodyReader<'x> {
    fn new(xml: &'x str, images: &'x HashMap<String, String>) -> Self {
        Self {
            xml,
            reader: Reader::from_str(xml),
            images,
            document: Document::new(),
            chunks: Vec::new(),
            markup_start: 0,
            frames: Vec::new(),
            referenced: HashSet::new(),
        }
    }

    fn position(&self) -> usize {
        self.reader.buffer_position() as usize
    }

    fn slice(&self, from: usize) -> String {
        self.xml[from..self.position()].to_string()
    }

    fn read(&mut self) -> Result<(), DocxError> {
        loop {
            match self.reader.read_event()? {
                Event::Start(e) => self.start(&e)?,
                Event::Empty(e) => self.empty(&e),
                Event::End(e) => self.end(e.name().as_ref())?,
                Event::Eof => break,
                _ => {}
            }
        }
        let rest = self.xml[self.markup_start..].to_string();
        self.chunks.push(Chunk::Markup(rest));
        Ok(())
    }

    fn start(&mut self, element: &BytesStart<'_>) -> Result<(), DocxError> {
        let name = element.name();
        let Some(level) = self.level() else {
            if name.as_ref() == b"w:body" {
                self.frames.push(Frame::Body(Vec::new()));
            }
            return Ok(());
        };

        match (level, name.as_ref()) {
            (Level::Container, b"w:p") => {
                let paragraph = self.paragraph()?;
                self.push_block(Block::Paragraph(paragraph));
            }
            (Level::Container, b"w:tbl") => self.frames.push(Frame::Table(Table::default())),
            (Level::Table, b"w:tr") => self.frames.push(Frame::Row(TableRow::default())),
            (Level::Row, b"w:tc") => self.frames.push(Frame::Cell(TableCell::default())),
            (Level::Container, _) => {
                self.reader.read_to_end(name)?;
                self.opaque_block(element);
            }
            _ => {
                self.reader.read_to_end(name)?;
            }
        }
        Ok(())
    }

    fn level(&self) -> Option<Level> {
        Some(match self.frames.last()? {
            Frame::Body(_) | Frame::Cell(_) => Level::Container,
            Frame::Table(_) => Level::Table,
            Frame::Row(_) => Level::Row,
        })
    }

    fn empty(&mut self, element: &BytesStart<'_>) {
        if self.level() != Some(Level::Container) {
            return;
        }
        if element.name().as_ref() == b"w:p" {
            // No runs to rewrite; the element stays in the surrounding markup.
            let id = self.document.next_id();
            self.push_block(Block::Paragraph(Paragraph {
                id,
                runs: Vec::new(),
            }));
        } else {
            self.opaque_block(element);
        }
    }

    fn end(&mut self, name: &[u8]) -> Result<(), DocxError> {
        let unexpected = || {
            DocxError::Malformed(format!("unexpected </{}>", String::from_utf8_lossy(name)))
        };
        match name {
            b"w:body" => {
                let Some(Frame::Body(blocks)) = self.frames.pop() else {
                    return Err(unexpected());
                };
                self.document.body.blocks = blocks;
            }
            b"w:tbl" => {
                let Some(Frame::Table(table)) = self.frames.pop() else {
                    return Err(unexpected());
                };
                self.push_block(Block::Table(table));
            }
            b"w:tr" => {
                let Some(Frame::Row(row)) = self.frames.pop() else {
                    return Err(unexpected());
                };
                let Some(Frame::Table(table)) = self.frames.last_mut() else {
                    return Err(unexpected());
                };
                table.rows.push(row);
            }
            b"w:tc" => {
                let Some(Frame::Cell(cell)) = self.frames.pop() else {
                    return Err(unexpected());
                };
                let Some(Frame::Row(row)) = self.frames.last_mut() else {
                    return Err(unexpected());
                };
                row.cells.push(cell);
            }
            _ => {}
        }
        Ok(())
    }

    fn push_block(&mut self, block: Block) {
        match self.frames.last_mut() {
            Some(Frame::Body(blocks)) => blocks.push(block),
            Some(Frame::Cell(cell)) => cell.blocks.push(block),
            _ => trace!("Block outside any container dropped"),
        }
    }

    /// Property elements (`w:tcPr`, ...) are layout, not blocks; section
    /// properties are the exception.
    fn opaque_block(&mut self, element: &BytesStart<'_>) {
        let kind = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
        if kind.ends_with("Pr") && kind != "sectPr" {
            return;
        }
        self.push_block(Block::Opaque { kind });
    }

    /// Everything after the paragraph properties is rewritten from the tree
    /// on save, so the markup is cut at the first other child.
    fn paragraph(&mut self) -> Result<Paragraph, DocxError> {
        let id = self.document.next_id();
        let mut runs = Vec::new();
        let mut cut = false;

        loop {
            let before = self.position();
            let event = self.reader.read_event()?;
            let prelude = match &event {
                Event::Start(e) | Event::Empty(e) => e.name().as_ref() == b"w:pPr",
                Event::Text(_) | Event::Comment(_) => true,
                _ => false,
            };
            if !cut && !prelude {
                let markup = self.xml[self.markup_start..before].to_string();
                self.chunks.push(Chunk::Markup(markup));
                self.chunks.push(Chunk::Runs(id));
                cut = true;
            }

            match event {
                Event::Start(e) => match e.name().as_ref() {
                    b"w:pPr" => {
                        self.reader.read_to_end(e.name())?;
                    }
                    b"w:r" => runs.push(self.run()?),
                    _ => {
                        self.reader.read_to_end(e.name())?;
                        runs.push(self.standalone(before));
                    }
                },
                Event::Empty(e) => match e.name().as_ref() {
                    b"w:pPr" | b"w:r" | b"w:proofErr" => {}
                    _ => runs.push(self.standalone(before)),
                },
                Event::End(_) => {
                    self.markup_start = before;
                    break;
                }
                Event::Eof => return Err(DocxError::Malformed("unterminated paragraph".into())),
                _ => {}
            }
        }
        Ok(Paragraph { id, runs })
    }

    /// Paragraph-level markup kept verbatim (bookmarks, hyperlinks, fields).
    fn standalone(&mut self, from: usize) -> Run {
        Run {
            id: self.document.next_id(),
            properties: Arc::default(),
            content: vec![RunContent::Opaque {
                xml: self.slice(from),
                standalone: true,
            }],
        }
    }

    fn run(&mut self) -> Result<Run, DocxError> {
        let id = self.document.next_id();
        let mut properties = RunProperties::default();
        let mut content = Vec::new();

        loop {
            let before = self.position();
            match self.reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"w:rPr" => properties = self.run_properties()?,
                    b"w:t" => {
                        let text = self.text()?;
                        content.push(RunContent::Text(TextFragment {
                            id: self.document.next_id(),
                            text,
                        }));
                    }
                    b"w:drawing" => {
                        self.reader.read_to_end(e.name())?;
                        let xml = self.slice(before);
                        content.push(self.drawing(xml)?);
                    }
                    _ => {
                        self.reader.read_to_end(e.name())?;
                        content.push(inline_opaque(self.slice(before)));
                    }
                },
                Event::Empty(e) => match e.name().as_ref() {
                    b"w:rPr" | b"w:t" | b"w:lastRenderedPageBreak" => {}
                    b"w:cr" => content.push(RunContent::Break),
                    b"w:br" if is_line_break(&e)? => content.push(RunContent::Break),
                    _ => content.push(inline_opaque(self.slice(before))),
                },
                Event::End(_) => break,
                Event::Eof => return Err(DocxError::Malformed("unterminated run".into())),
                _ => {}
            }
        }

        Ok(Run {
            id,
            properties: Arc::new(properties),
            content,
        })
    }

    fn text(&mut self) -> Result<String, DocxError> {
        let mut text = String::new();
        loop {
            match self.reader.read_event()? {
                Event::Text(t) => text.push_str(&t.unescape()?),
                Event::CData(data) => text.push_str(&String::from_utf8_lossy(&data)),
                Event::End(_) => return Ok(text),
                Event::Eof => return Err(DocxError::Malformed("unterminated text".into())),
                _ => {}
            }
        }
    }

    fn run_properties(&mut self) -> Result<RunProperties, DocxError> {
        let mut properties = RunProperties::default();
        loop {
            let before = self.position();
            match self.reader.read_event()? {
                Event::Start(e) => {
                    self.reader.read_to_end(e.name())?;
                    apply_property(&mut properties, &e, self.slice(before))?;
                }
                Event::Empty(e) => apply_property(&mut properties, &e, self.slice(before))?,
                Event::End(_) => return Ok(properties),
                Event::Eof => {
                    return Err(DocxError::Malformed("unterminated run properties".into()));
                }
                _ => {}
            }
        }
    }

    /// An inline picture backed by a known image part becomes a drawing;
    /// anything else stays as markup.
    fn drawing(&mut self, xml: String) -> Result<RunContent, DocxError> {
        let Some(mut drawing) = parse_inline_drawing(&xml)? else {
            return Ok(inline_opaque(xml));
        };
        if !self.images.contains_key(&drawing.media.0) {
            return Ok(inline_opaque(xml));
        }
        drawing.id = self.document.next_id();
        self.referenced.insert(drawing.media.0.clone());
        Ok(RunContent::Drawing(drawing))
    }
}

fn inline_opaque(xml: String) -> RunContent {
    RunContent::Opaque {
        xml,
        standalone: false,
    }
}

/// `w:br` without a type, or a text-wrapping one, is a line break; page and
/// column breaks are kept as markup.
fn is_line_break(element: &BytesStart<'_>) -> Result<bool, DocxError> {
    Ok(attributes(element)?
        .iter()
        .find(|(name, _)| name == "type")
        .is_none_or(|(_, value)| value == "textWrapping"))
}

/// Fold one `w:rPr` child into `properties`. Elements that the model does
/// not represent exactly are kept as markup in `extra`.
fn apply_property(
    properties: &mut RunProperties,
    element: &BytesStart<'_>,
    xml: String,
) -> Result<(), DocxError> {
    let attrs = attributes(element)?;
    let get = |key: &str| {
        attrs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    };
    let only = |allowed: &[&str]| attrs.iter().all(|(name, _)| allowed.contains(&name.as_str()));
    let val = get("val");

    let modelled = match element.local_name().as_ref() {
        b"b" if only(&["val"]) && is_on(val) => {
            properties.bold = true;
            true
        }
        b"i" if only(&["val"]) && is_on(val) => {
            properties.italic = true;
            true
        }
        b"sz" if only(&["val"]) => match val.and_then(|v| v.parse().ok()) {
            Some(size) => {
                properties.size_half_points = Some(size);
                true
            }
            None => false,
        },
        b"color" if only(&["val"]) => match val.and_then(parse_color) {
            Some(color) => {
                properties.color = Some(color);
                true
            }
            None => false,
        },
        b"highlight" if only(&["val"]) && val.is_some() => {
            properties.highlight = val.map(str::to_string);
            true
        }
        b"u" if only(&["val"]) && val == Some("single") => {
            properties.underline = true;
            true
        }
        b"rFonts" if only(&["ascii", "hAnsi"]) => match (get("ascii"), get("hAnsi")) {
            (Some(font), None) | (None, Some(font)) => {
                properties.font = Some(font.to_string());
                true
            }
            (Some(ascii), Some(h_ansi)) if ascii == h_ansi => {
                properties.font = Some(ascii.to_string());
                true
            }
            _ => false,
        },
        _ => false,
    };
    if !modelled {
        properties.extra.push(xml);
    }
    Ok(())
}

fn is_on(val: Option<&str>) -> bool {
    matches!(val, None | Some("1" | "true" | "on"))
}

fn parse_color(hex: &str) -> Option<Color> {
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |at: usize| u8::from_str_radix(&hex[at..at + 2], 16).ok();
    Some(Color {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

/// Size, spacing, name and picture reference of a `w:drawing` holding an
/// inline picture. Anchored (floating) pictures are not read.
fn parse_inline_drawing(xml: &str) -> Result<Option<Drawing>, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut inline = false;
    let mut distance = Distance::default();
    let mut extent = None;
    let mut name = String::new();
    let mut embed = None;

    loop {
        let element = match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => e,
            Event::Eof => break,
            _ => continue,
        };
        let attrs = attributes(&element)?;
        let get = |key: &str| {
            attrs
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.as_str())
        };
        match element.local_name().as_ref() {
            b"anchor" => return Ok(None),
            b"inline" => {
                inline = true;
                let dist = |key: &str| get(key).and_then(|v| v.parse().ok()).unwrap_or(0);
                distance = Distance {
                    top: dist("distT"),
                    bottom: dist("distB"),
                    left: dist("distL"),
                    right: dist("distR"),
                };
            }
            b"extent" if extent.is_none() => {
                let cx = get("cx").and_then(|v| v.parse().ok());
                let cy = get("cy").and_then(|v| v.parse().ok());
                if let (Some(cx), Some(cy)) = (cx, cy) {
                    extent = Some(Extent { cx, cy });
                }
            }
            b"docPr" => name = get("name").unwrap_or_default().to_string(),
            b"blip" => embed = get("embed").map(str::to_string),
            _ => {}
        }
    }

    let (true, Some(extent), Some(embed)) = (inline, extent, embed) else {
        return Ok(None);
    };
    Ok(Some(Drawing {
        id: Default::default(),
        media: MediaId(embed),
        extent,
        distance,
        placement: Placement::Inline,
        name,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::package;
    use super::*;

    fn read(body: &str) -> (Document, Skeleton) {
        read_package(&package(body)).unwrap()
    }

    fn runs(document: &Document) -> Vec<Vec<RunContent>> {
        document.body.paragraphs()[0]
            .runs
            .iter()
            .map(|run| run.content.clone())
            .collect()
    }

    #[test]
    fn markup_is_cut_after_paragraph_properties() {
        let (document, skeleton) = read(
            r#"<w:p><w:pPr><w:jc w:val="right"/></w:pPr><w:r><w:t>Hi</w:t></w:r></w:p>"#,
        );
        let id = document.body.paragraphs()[0].id;
        let [Chunk::Markup(head), Chunk::Runs(runs), Chunk::Markup(tail)] = &skeleton.chunks[..]
        else {
            panic!("unexpected chunks {:?}", skeleton.chunks);
        };
        assert!(head.ends_with(r#"<w:p><w:pPr><w:jc w:val="right"/></w:pPr>"#));
        assert_eq!(*runs, id);
        assert!(tail.starts_with("</w:p></w:body>"));
    }

    #[test]
    fn run_children_map_to_content() {
        let (document, _) = read(concat!(
            r#"<w:p><w:r><w:t xml:space="preserve">a &amp; b</w:t><w:br/><w:tab/>"#,
            r#"<w:br w:type="page"/><w:lastRenderedPageBreak/><w:t>c</w:t></w:r></w:p>"#
        ));
        let content = &runs(&document)[0];
        assert!(matches!(&content[0], RunContent::Text(f) if f.text == "a & b"));
        assert_eq!(content[1], RunContent::Break);
        assert_eq!(
            content[2],
            RunContent::Opaque {
                xml: "<w:tab/>".into(),
                standalone: false
            }
        );
        assert!(matches!(&content[3], RunContent::Opaque { xml, .. } if xml.contains("page")));
        assert!(matches!(&content[4], RunContent::Text(f) if f.text == "c"));
        assert_eq!(content.len(), 5);
    }

    #[test]
    fn paragraph_level_markup_becomes_standalone_runs() {
        let (document, _) = read(concat!(
            r#"<w:p><w:bookmarkStart w:id="0" w:name="x"/><w:proofErr w:type="spellStart"/>"#,
            r#"<w:r><w:t>{Na</w:t></w:r><w:r><w:t>me}</w:t></w:r></w:p>"#
        ));
        let all = runs(&document);
        assert_eq!(all.len(), 3);
        let RunContent::Opaque { xml, standalone } = &all[0][0] else {
            panic!("expected markup, got {:?}", all[0][0]);
        };
        assert!(*standalone);
        assert!(xml.starts_with("<w:bookmarkStart"));
        assert_eq!(document.body.paragraphs()[0].plain_text(), "{Name}");
    }

    #[test]
    fn run_properties_are_modelled_or_kept() {
        let (document, _) = read(concat!(
            r#"<w:p><w:r><w:rPr><w:rFonts w:ascii="Arial" w:hAnsi="Arial"/><w:b/>"#,
            r#"<w:i w:val="0"/><w:color w:val="auto"/><w:sz w:val="24"/>"#,
            r#"<w:highlight w:val="yellow"/><w:u w:val="single"/><w:vertAlign w:val="superscript"/>"#,
            r#"</w:rPr><w:t>x</w:t></w:r></w:p>"#
        ));
        let properties = &document.body.paragraphs()[0].runs[0].properties;
        assert_eq!(properties.font.as_deref(), Some("Arial"));
        assert!(properties.bold);
        assert!(!properties.italic);
        assert_eq!(properties.color, None);
        assert_eq!(properties.size_half_points, Some(24));
        assert_eq!(properties.highlight.as_deref(), Some("yellow"));
        assert!(properties.underline);
        assert_eq!(
            properties.extra,
            vec![
                r#"<w:i w:val="0"/>"#.to_string(),
                r#"<w:color w:val="auto"/>"#.to_string(),
                r#"<w:vertAlign w:val="superscript"/>"#.to_string(),
            ]
        );
    }

    #[test]
    fn tables_nest_their_paragraphs() {
        let (document, _) = read(concat!(
            r#"<w:p><w:r><w:t>before</w:t></w:r></w:p>"#,
            r#"<w:tbl><w:tblPr/><w:tblGrid><w:gridCol w:w="10"/></w:tblGrid>"#,
            r#"<w:tr><w:trPr/><w:tc><w:tcPr><w:tcW w:w="10"/></w:tcPr><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc>"#,
            r#"<w:tc><w:p/></w:tc></w:tr></w:tbl>"#,
            r#"<w:sdt><w:sdtContent><w:p><w:r><w:t>{Hidden}</w:t></w:r></w:p></w:sdtContent></w:sdt>"#,
            r#"<w:sectPr/>"#
        ));
        let blocks = &document.body.blocks;
        assert_eq!(blocks.len(), 4);
        let Block::Table(table) = &blocks[1] else {
            panic!("expected a table, got {:?}", blocks[1]);
        };
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].cells.len(), 2);
        assert_eq!(table.rows[0].cells[0].blocks.len(), 1);
        assert!(matches!(&blocks[2], Block::Opaque { kind } if kind == "sdt"));
        assert!(matches!(&blocks[3], Block::Opaque { kind } if kind == "sectPr"));

        let texts: Vec<String> = document
            .body
            .paragraphs()
            .iter()
            .map(|p| p.plain_text())
            .collect();
        assert_eq!(texts, vec!["before", "a", ""]);
    }

    #[test]
    fn inline_pictures_are_read_with_their_media() {
        let (document, skeleton) = read(concat!(
            r#"<w:p><w:r><w:drawing><wp:inline distT="1" distB="2" distL="3" distR="4" "#,
            r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
            r#"<wp:extent cx="100" cy="200"/><wp:docPr id="7" name="Logo"/>"#,
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:blip r:embed="rId4"/></a:graphic>"#,
            r#"</wp:inline></w:drawing></w:r></w:p>"#
        ));
        let drawing = document.body.paragraphs()[0].drawings().next().cloned().unwrap();
        assert_eq!(drawing.media, MediaId("rId4".into()));
        assert_eq!(drawing.extent, Extent { cx: 100, cy: 200 });
        assert_eq!(drawing.distance, Distance { top: 1, bottom: 2, left: 3, right: 4 });
        assert_eq!(drawing.name, "Logo");
        assert_eq!(skeleton.max_drawing_id, 7);
        assert!(skeleton.existing_media.contains(&drawing.media));
        assert_eq!(document.media.get(&drawing.media).unwrap().bytes, b"existing");
    }

    #[test]
    fn pictures_without_a_known_part_stay_markup() {
        let (document, skeleton) = read(concat!(
            r#"<w:p><w:r><w:drawing><wp:inline xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
            r#"<wp:extent cx="1" cy="1"/><wp:docPr id="3" name="x"/><a:blip r:embed="rId1"/>"#,
            r#"</wp:inline></w:drawing></w:r></w:p>"#
        ));
        assert_eq!(document.body.paragraphs()[0].drawings().count(), 0);
        let content = &runs(&document)[0];
        assert!(
            matches!(&content[0], RunContent::Opaque { xml, .. } if xml.starts_with("<w:drawing>"))
        );
        assert!(document.media.is_empty());
        assert_eq!(skeleton.max_drawing_id, 3);
    }

    #[test]
    fn relationships_are_listed() {
        let rels = parse_relationships(super::super::fixtures::RELATIONSHIPS).unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[1].id, "rId4");
        assert_eq!(rels[1].kind, IMAGE_RELATIONSHIP);
        assert_eq!(resolve_target(&rels[1].target), "word/media/image1.png");
        assert_eq!(resolve_target("/word/media/a.png"), "word/media/a.png");
    }
}
