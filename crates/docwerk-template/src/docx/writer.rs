// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Package writer — renders the tree back into `word/document.xml` and copies
// the rest of the package, adding media parts for new pictures.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::reader::{attributes, parse_relationships, read_part};
use super::{
    CONTENT_TYPES_PART, Chunk, DOCUMENT_PART, DocxError, IMAGE_RELATIONSHIP, RELATIONSHIPS_PART,
    Skeleton,
};
use crate::media::MediaId;
use crate::model::{Document, Drawing, NodeId, Paragraph, Run, RunContent, RunProperties};

const EMPTY_RELATIONSHIPS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"</Relationships>"#
);

/// Order of the `w:rPr` children the schema requires. Names not listed go
/// after these, and revision marks go last.
const PROPERTY_ORDER: &[&str] = &[
    "rStyle", "rFonts", "b", "bCs", "i", "iCs", "caps", "smallCaps", "strike", "dstrike",
    "outline", "shadow", "emboss", "imprint", "noProof", "snapToGrid", "vanish", "webHidden",
    "color", "spacing", "w", "kern", "position", "sz", "szCs", "highlight", "u", "effect", "bdr",
    "shd", "fitText", "vertAlign", "rtl", "cs", "em", "lang", "eastAsianLayout", "specVanish",
    "oMath",
];

/// A media part the package does not hold yet.
struct NewPart<'d> {
    relationship: String,
    name: String,
    extension: &'static str,
    content_type: &'d str,
    bytes: &'d [u8],
}

/// Build a new package from `package` with the document part rendered from
/// `document`.
pub(crate) fn write_package(
    package: &[u8],
    document: &Document,
    skeleton: &Skeleton,
) -> Result<Vec<u8>, DocxError> {
    let mut archive = ZipArchive::new(Cursor::new(package))?;
    let relationships = read_part(&mut archive, RELATIONSHIPS_PART)?
        .unwrap_or_else(|| EMPTY_RELATIONSHIPS.to_string());
    let content_types = read_part(&mut archive, CONTENT_TYPES_PART)?
        .ok_or_else(|| DocxError::Malformed(format!("package has no {CONTENT_TYPES_PART}")))?;

    let taken: HashSet<String> = parse_relationships(&relationships)?
        .into_iter()
        .map(|rel| rel.id)
        .collect();
    let mut next_relationship = taken
        .iter()
        .filter_map(|id| MediaId(id.clone()).number())
        .max()
        .unwrap_or(0);
    let mut next_name = 0;

    let mut embeds: HashMap<&MediaId, String> = HashMap::new();
    let mut new_parts = Vec::new();
    for part in document.media.iter() {
        if skeleton.existing_media.contains(&part.id) {
            embeds.insert(&part.id, part.id.0.clone());
            continue;
        }
        let relationship = loop {
            next_relationship += 1;
            let id = format!("rId{next_relationship}");
            if !taken.contains(&id) {
                break id;
            }
        };
        let extension = extension_for(&part.content_type);
        let name = loop {
            next_name += 1;
            let name = format!("word/media/docwerk{next_name}.{extension}");
            if archive.index_for_name(&name).is_none() {
                break name;
            }
        };
        embeds.insert(&part.id, relationship.clone());
        new_parts.push(NewPart {
            relationship,
            name,
            extension,
            content_type: &part.content_type,
            bytes: &part.bytes,
        });
    }

    let document_xml = render_document(document, skeleton, &embeds)?;
    let relationships = add_relationships(&relationships, &new_parts)?;
    let content_types = add_content_types(&content_types, &new_parts)?;

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(CONTENT_TYPES_PART, options)?;
    writer.write_all(content_types.as_bytes())?;
    for index in 0..archive.len() {
        let file = archive.by_index_raw(index)?;
        let rewritten = matches!(
            file.name(),
            CONTENT_TYPES_PART | DOCUMENT_PART | RELATIONSHIPS_PART
        );
        if !rewritten {
            writer.raw_copy_file(file)?;
        }
    }
    writer.start_file(DOCUMENT_PART, options)?;
    writer.write_all(document_xml.as_bytes())?;
    writer.start_file(RELATIONSHIPS_PART, options)?;
    writer.write_all(relationships.as_bytes())?;
    for part in &new_parts {
        writer.start_file(part.name.as_str(), options)?;
        writer.write_all(part.bytes)?;
    }

    debug!(media_added = new_parts.len(), "Package written");
    Ok(writer.finish()?.into_inner())
}

/// File extension for a media content type.
fn extension_for(content_type: &str) -> &'static str {
    image::ImageFormat::from_mime_type(content_type)
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("bin")
}

/// The document part with every paragraph's runs written from the tree.
/// Paragraphs added to the tree after loading have no place in the markup and
/// are not written.
fn render_document(
    document: &Document,
    skeleton: &Skeleton,
    embeds: &HashMap<&MediaId, String>,
) -> Result<String, DocxError> {
    let paragraphs: HashMap<NodeId, &Paragraph> = document
        .body
        .paragraphs()
        .into_iter()
        .map(|paragraph| (paragraph.id, paragraph))
        .collect();

    let mut out = String::new();
    let mut drawing_id = skeleton.max_drawing_id;
    for chunk in &skeleton.chunks {
        match chunk {
            Chunk::Markup(markup) => out.push_str(markup),
            Chunk::Runs(id) => {
                if let Some(paragraph) = paragraphs.get(id) {
                    for run in &paragraph.runs {
                        render_run(&mut out, run, embeds, &mut drawing_id)?;
                    }
                }
            }
        }
    }
    Ok(out)
}

fn render_run(
    out: &mut String,
    run: &Run,
    embeds: &HashMap<&MediaId, String>,
    drawing_id: &mut u64,
) -> Result<(), DocxError> {
    let mut open = false;
    for item in &run.content {
        if let RunContent::Opaque {
            xml,
            standalone: true,
        } = item
        {
            if open {
                out.push_str("</w:r>");
                open = false;
            }
            out.push_str(xml);
            continue;
        }

        if !open {
            out.push_str("<w:r>");
            render_properties(out, &run.properties);
            open = true;
        }
        match item {
            RunContent::Text(fragment) => {
                out.push_str(r#"<w:t xml:space="preserve">"#);
                out.push_str(&escape(fragment.text.as_str()));
                out.push_str("</w:t>");
            }
            RunContent::Break => out.push_str("<w:br/>"),
            RunContent::Drawing(drawing) => {
                let embed = embeds.get(&drawing.media).ok_or_else(|| {
                    DocxError::Malformed(format!(
                        "drawing {} refers to unknown media {}",
                        drawing.id, drawing.media
                    ))
                })?;
                *drawing_id += 1;
                render_drawing(out, drawing, embed, *drawing_id);
            }
            RunContent::Opaque { xml, .. } => out.push_str(xml),
        }
    }
    if open {
        out.push_str("</w:r>");
    }
    Ok(())
}

fn render_properties(out: &mut String, properties: &RunProperties) {
    let val = |value: &str| format!(r#" w:val="{}""#, escape(value));
    let mut elements: Vec<(String, String)> = Vec::new();
    if let Some(font) = &properties.font {
        let font = escape(font.as_str());
        elements.push((
            "rFonts".into(),
            format!(r#"<w:rFonts w:ascii="{font}" w:hAnsi="{font}"/>"#),
        ));
    }
    if properties.bold {
        elements.push(("b".into(), "<w:b/>".into()));
    }
    if properties.italic {
        elements.push(("i".into(), "<w:i/>".into()));
    }
    if let Some(color) = properties.color {
        elements.push(("color".into(), format!("<w:color{}/>", val(&color.to_hex()))));
    }
    if let Some(size) = properties.size_half_points {
        elements.push(("sz".into(), format!("<w:sz{}/>", val(&size.to_string()))));
    }
    if let Some(highlight) = &properties.highlight {
        elements.push(("highlight".into(), format!("<w:highlight{}/>", val(highlight))));
    }
    if properties.underline {
        elements.push(("u".into(), format!("<w:u{}/>", val("single"))));
    }

    // A modelled value replaces carried markup for the same element.
    for xml in &properties.extra {
        let name = element_name(xml);
        if !elements.iter().any(|(existing, _)| *existing == name) {
            elements.push((name, xml.clone()));
        }
    }
    if elements.is_empty() {
        return;
    }

    elements.sort_by_key(|(name, _)| property_rank(name));
    out.push_str("<w:rPr>");
    for (_, xml) in &elements {
        out.push_str(xml);
    }
    out.push_str("</w:rPr>");
}

/// Local name of the first element in `xml`.
fn element_name(xml: &str) -> String {
    let tag = xml.trim_start().trim_start_matches('<');
    let end = tag
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(tag.len());
    let qualified = &tag[..end];
    qualified
        .rsplit_once(':')
        .map_or(qualified, |(_, local)| local)
        .to_string()
}

fn property_rank(name: &str) -> usize {
    if name == "rPrChange" {
        return PROPERTY_ORDER.len() + 1;
    }
    PROPERTY_ORDER
        .iter()
        .position(|known| *known == name)
        .unwrap_or(PROPERTY_ORDER.len())
}

fn render_drawing(out: &mut String, drawing: &Drawing, embed: &str, doc_pr_id: u64) {
    let name = escape(drawing.name.as_str());
    out.push_str(&format!(
        concat!(
            r#"<w:drawing><wp:inline distT="{top}" distB="{bottom}" distL="{left}" distR="{right}" "#,
            r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/><wp:effectExtent l="0" t="0" r="0" b="0"/>"#,
            r#"<wp:docPr id="{id}" name="{name}"/>"#,
            r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks "#,
            r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" noChangeAspect="1"/>"#,
            r#"</wp:cNvGraphicFramePr>"#,
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="0" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{embed}" "#,
            r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/>"#,
            r#"<a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"#
        ),
        top = drawing.distance.top,
        bottom = drawing.distance.bottom,
        left = drawing.distance.left,
        right = drawing.distance.right,
        cx = drawing.extent.cx,
        cy = drawing.extent.cy,
        id = doc_pr_id,
        name = name,
        embed = embed,
    ));
}

fn add_relationships(xml: &str, parts: &[NewPart<'_>]) -> Result<String, DocxError> {
    if parts.is_empty() {
        return Ok(xml.to_string());
    }
    let close = xml
        .rfind("</Relationships>")
        .ok_or_else(|| DocxError::Malformed("relationships part is not closed".into()))?;
    let mut out = xml[..close].to_string();
    for part in parts {
        let target = part.name.trim_start_matches("word/");
        out.push_str(&format!(
            r#"<Relationship Id="{}" Type="{IMAGE_RELATIONSHIP}" Target="{}"/>"#,
            part.relationship,
            escape(target)
        ));
    }
    out.push_str(&xml[close..]);
    Ok(out)
}

/// Declare a default content type for each new media extension the package
/// does not already know.
fn add_content_types(xml: &str, parts: &[NewPart<'_>]) -> Result<String, DocxError> {
    let mut known = HashSet::new();
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Default" => {
                for (name, value) in attributes(&e)? {
                    if name == "Extension" {
                        known.insert(value.to_ascii_lowercase());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut defaults = String::new();
    for part in parts {
        if known.insert(part.extension.to_string()) {
            defaults.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                part.extension,
                escape(part.content_type)
            ));
        }
    }
    if defaults.is_empty() {
        return Ok(xml.to_string());
    }

    let close = xml
        .rfind("</Types>")
        .ok_or_else(|| DocxError::Malformed("content types part is not closed".into()))?;
    Ok(format!("{}{defaults}{}", &xml[..close], &xml[close..]))
}
