// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DOCX sessions — open a WordprocessingML package, expose its main document
// as a content tree, and write the edited tree back into a copy of the
// package.
//
// Only paragraph runs are rebuilt from the tree. Everything else in
// `word/document.xml` (section properties, table layout, paragraph
// properties, content controls) is kept as the original markup, and every
// other part of the package is copied unchanged. Inline pictures are read as
// drawings over their existing media; new pictures become `word/media/*`
// parts with image relationships.

mod reader;
mod writer;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use docwerk_core::error::{DocwerkError, Result};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::media::MediaId;
use crate::model::{Document, NodeId};
use crate::session::{DocumentSession, write_atomically};

/// Main document part.
pub(crate) const DOCUMENT_PART: &str = "word/document.xml";
/// Relationships of the main document part.
pub(crate) const RELATIONSHIPS_PART: &str = "word/_rels/document.xml.rels";
/// Package content type declarations.
pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
/// Relationship type of picture parts.
pub(crate) const IMAGE_RELATIONSHIP: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("invalid package: {0}")]
    Package(#[from] zip::result::ZipError),

    #[error("invalid markup: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Malformed(String),
}

/// `word/document.xml` cut into markup kept verbatim and the places where a
/// paragraph's runs are written back from the tree.
#[derive(Debug, Clone, Default)]
pub(crate) struct Skeleton {
    pub chunks: Vec<Chunk>,
    /// Highest `wp:docPr` id in the template; new pictures are numbered past it.
    pub max_drawing_id: u64,
    /// Media loaded from parts already in the package, keyed by their
    /// relationship id.
    pub existing_media: HashSet<MediaId>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Chunk {
    Markup(String),
    Runs(NodeId),
}

/// Session over a `.docx` template.
///
/// The template file is read once at open and never written; `save` builds a
/// new package and writes it to the target path.
pub struct DocxSession {
    document: Document,
    skeleton: Skeleton,
    package: Vec<u8>,
    target: PathBuf,
}

impl DocxSession {
    /// Load the package at `template`; later saves go to `target`.
    #[instrument(skip_all, fields(template = %template.as_ref().display()))]
    pub fn open(template: impl AsRef<Path>, target: impl Into<PathBuf>) -> Result<Self> {
        let template = template.as_ref();
        let open_err = |reason: String| DocwerkError::TemplateOpen {
            path: template.to_path_buf(),
            reason,
        };

        let package = std::fs::read(template).map_err(|err| open_err(err.to_string()))?;
        let (document, skeleton) =
            reader::read_package(&package).map_err(|err| open_err(err.to_string()))?;
        debug!(
            paragraphs = document.body.paragraphs().len(),
            chunks = skeleton.chunks.len(),
            "DOCX template loaded"
        );

        Ok(Self {
            document,
            skeleton,
            package,
            target: target.into(),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// The package with the current tree written into it.
    pub fn to_bytes(&self) -> std::result::Result<Vec<u8>, DocxError> {
        writer::write_package(&self.package, &self.document, &self.skeleton)
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

impl std::fmt::Debug for DocxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocxSession")
            .field("target", &self.target)
            .field("package_len", &self.package.len())
            .finish_non_exhaustive()
    }
}

impl DocumentSession for DocxSession {
    fn document(&self) -> &Document {
        &self.document
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    fn save(&mut self) -> Result<()> {
        let bytes = self.to_bytes().map_err(|err| DocwerkError::Persistence {
            path: self.target.clone(),
            source: std::io::Error::other(err),
        })?;
        write_atomically(&self.target, &bytes)
    }

    fn location(&self) -> String {
        self.target.display().to_string()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::{Cursor, Read, Write};

    use zip::write::SimpleFileOptions;
    use zip::{ZipArchive, ZipWriter};

    pub const CONTENT_TYPES: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
        r#"<Default Extension="xml" ContentType="application/xml"/>"#,
        r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
        r#"</Types>"#
    );

    pub const RELATIONSHIPS: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
        r#"<Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>"#,
        r#"</Relationships>"#
    );

    /// Wrap body markup in a `w:document` element.
    pub fn document_xml(body: &str) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
                r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
                r#"<w:body>{}</w:body></w:document>"#
            ),
            body
        )
    }

    /// A minimal package holding `body` as its main document.
    pub fn package(body: &str) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES.to_string()),
            ("word/_rels/document.xml.rels", RELATIONSHIPS.to_string()),
            ("word/styles.xml", "<w:styles/>".to_string()),
            ("word/document.xml", document_xml(body)),
        ];
        for (name, content) in parts {
            writer.start_file(name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.start_file("word/media/image1.png", options).unwrap();
        writer.write_all(b"existing").unwrap();
        writer.finish().unwrap().into_inner()
    }

    /// Read one part of a package as text.
    pub fn part(package: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(package)).unwrap();
        let mut text = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut text).unwrap();
        text
    }

    /// Names of every part in a package.
    pub fn part_names(package: &[u8]) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(package)).unwrap();
        archive.file_names().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, RgbImage};

    use super::fixtures::{package, part, part_names};
    use super::*;
    use crate::builder::{ImagePayload, LengthUnit};
    use crate::engine::{Substitutions, TemplateEngine};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn open(body: &str) -> (tempfile::TempDir, DocxSession) {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("letter.docx");
        std::fs::write(&template, package(body)).unwrap();
        let session = DocxSession::open(&template, dir.path().join("out.docx")).unwrap();
        (dir, session)
    }

    const LETTER: &str = concat!(
        r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr>"#,
        r#"<w:r><w:rPr><w:b/><w:color w:val="808080"/></w:rPr><w:t xml:space="preserve">Dear {Na</w:t></w:r>"#,
        r#"<w:proofErr w:type="spellStart"/>"#,
        r#"<w:r><w:t>me},</w:t></w:r>"#,
        r#"</w:p>"#,
        r#"<w:tbl><w:tblPr><w:tblW w:w="0" w:type="auto"/></w:tblPr><w:tr><w:tc><w:tcPr/>"#,
        r#"<w:p><w:r><w:t>{Photo}</w:t></w:r></w:p>"#,
        r#"</w:tc></w:tr></w:tbl>"#,
        r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr>"#
    );

    #[test]
    fn fill_and_save_round_trip() {
        let (dir, mut session) = open(LETTER);
        let mut values = Substitutions::new();
        values.insert_text("Name", "Ada\\nLovelace");
        values.insert_image(
            "Photo",
            ImagePayload::new(png(10, 10), 10.0, 10.0, LengthUnit::Pixels),
        );

        let report = TemplateEngine::new().fill_session(&mut session, &values).unwrap();
        assert_eq!(report.replaced, 2);
        assert!(report.skipped.is_empty());

        let saved = std::fs::read(dir.path().join("out.docx")).unwrap();
        let xml = part(&saved, DOCUMENT_PART);
        assert!(xml.contains(r#"<w:pPr><w:jc w:val="center"/></w:pPr>"#));
        assert!(xml.contains(r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr>"#));
        assert!(xml.contains(r#"<w:tblPr><w:tblW w:w="0" w:type="auto"/></w:tblPr>"#));
        assert!(xml.contains(r#"<w:t xml:space="preserve">Ada</w:t></w:r><w:r><w:rPr><w:b/><w:color w:val="000000"/></w:rPr><w:br/>"#));
        assert!(xml.contains(r#"<wp:extent cx="95250" cy="95250"/>"#));
        assert!(xml.contains(r#"<wp:effectExtent l="0" t="0" r="0" b="0"/>"#));
        assert!(xml.contains(r#"name="Inserted Image""#));
        assert!(!xml.contains("{Name}") && !xml.contains("{Photo}"));

        // The new picture gets a relationship past the existing ones.
        let rels = part(&saved, RELATIONSHIPS_PART);
        assert!(rels.contains(r#"Id="rId4""#));
        assert!(rels.contains(r#"Id="rId5""#));
        assert!(xml.contains(r#"r:embed="rId5""#));
        assert!(part(&saved, CONTENT_TYPES_PART).contains(r#"Extension="png""#));
        let names = part_names(&saved);
        assert!(names.contains(&"word/styles.xml".to_string()));
        assert!(names.contains(&"word/media/image1.png".to_string()));
        assert!(names.iter().any(|name| name.starts_with("word/media/docwerk")));

        // The written package reads back to the filled text.
        let reopened = DocxSession::open(dir.path().join("out.docx"), dir.path().join("x.docx"))
            .unwrap();
        let texts: Vec<String> = reopened
            .document()
            .body
            .paragraphs()
            .iter()
            .map(|p| p.plain_text())
            .collect();
        assert_eq!(texts, vec!["Dear Ada\nLovelace,", "\u{FFFC}"]);
        assert_eq!(reopened.document().media.len(), 1);
    }

    #[test]
    fn existing_pictures_keep_their_parts() {
        let (_dir, mut session) = open(concat!(
            r#"<w:p><w:r><w:t>{Logo}</w:t></w:r><w:r><w:drawing>"#,
            r#"<wp:inline xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
            r#"<wp:extent cx="10" cy="10"/><wp:docPr id="9" name="Old"/><a:blip r:embed="rId4"/>"#,
            r#"</wp:inline></w:drawing></w:r></w:p>"#
        ));
        let mut values = Substitutions::new();
        values.insert_image(
            "Logo",
            ImagePayload::new(png(2, 2), 2.0, 2.0, LengthUnit::Pixels),
        );
        TemplateEngine::new().fill_session(&mut session, &values).unwrap();

        let saved = session.to_bytes().unwrap();
        let xml = part(&saved, DOCUMENT_PART);
        assert!(xml.contains(r#"r:embed="rId4""#));
        assert!(xml.contains(r#"r:embed="rId5""#));
        assert!(xml.contains(r#"<wp:docPr id="10" name="Inserted Image"/>"#));
        assert!(xml.contains(r#"<wp:docPr id="11" name="Old"/>"#));

        let rels = part(&saved, RELATIONSHIPS_PART);
        assert_eq!(rels.matches(r#"Id="rId4""#).count(), 1);
        let media: Vec<String> = part_names(&saved)
            .into_iter()
            .filter(|name| name.starts_with("word/media/"))
            .collect();
        assert_eq!(media.len(), 2);
    }

    #[test]
    fn untouched_template_keeps_its_markup() {
        let (_dir, session) = open(LETTER);
        let xml = part(&session.to_bytes().unwrap(), DOCUMENT_PART);
        assert!(xml.contains(r#"<w:t xml:space="preserve">{Photo}</w:t>"#));
        assert!(xml.contains(r#"<w:rPr><w:b/><w:color w:val="808080"/></w:rPr>"#));
        assert_eq!(
            session.document().body.paragraphs()[0].plain_text(),
            "Dear {Name},"
        );
    }

    #[test]
    fn template_that_is_not_a_package_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("broken.docx");
        std::fs::write(&template, b"not a zip").unwrap();
        assert!(matches!(
            DocxSession::open(&template, dir.path().join("o.docx")),
            Err(DocwerkError::TemplateOpen { .. })
        ));
    }

    #[test]
    fn unwritable_target_is_a_persistence_failure() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("letter.docx");
        std::fs::write(&template, package(LETTER)).unwrap();
        let target = dir.path().join("missing").join("out.docx");

        let mut session = DocxSession::open(&template, &target).unwrap();
        assert!(matches!(session.save(), Err(DocwerkError::Persistence { .. })));
    }
}
