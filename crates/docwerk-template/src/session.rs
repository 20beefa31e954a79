// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document sessions — own a parsed document for the length of one request
// and are the only place it is loaded from or saved to storage.

use std::path::{Path, PathBuf};

use docwerk_core::error::{DocwerkError, Result};
use tracing::{debug, info, instrument};

use crate::docx::DocxSession;
use crate::model::Document;

/// Exclusive owner of one document while it is being edited.
pub trait DocumentSession {
    fn document(&self) -> &Document;

    fn document_mut(&mut self) -> &mut Document;

    /// Persist the document. Either the whole document is written or nothing
    /// is.
    fn save(&mut self) -> Result<()>;

    /// Human-readable description of where `save` writes.
    fn location(&self) -> String;
}

/// Session over a document that lives only in memory.
#[derive(Debug, Default)]
pub struct MemorySession {
    document: Document,
    saves: usize,
}

impl MemorySession {
    pub fn new(document: Document) -> Self {
        Self { document, saves: 0 }
    }

    /// How many times `save` has been called.
    pub fn saves(&self) -> usize {
        self.saves
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

impl DocumentSession for MemorySession {
    fn document(&self) -> &Document {
        &self.document
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    fn save(&mut self) -> Result<()> {
        self.saves += 1;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Session over a template serialized as JSON.
///
/// The template is read once at open and never written; `save` goes to a
/// separate target path.
#[derive(Debug)]
pub struct JsonFileSession {
    document: Document,
    target: PathBuf,
}

impl JsonFileSession {
    /// Load the template at `template`; later saves go to `target`.
    #[instrument(skip_all, fields(template = %template.as_ref().display()))]
    pub fn open(template: impl AsRef<Path>, target: impl Into<PathBuf>) -> Result<Self> {
        let template = template.as_ref();
        let open_err = |reason: String| DocwerkError::TemplateOpen {
            path: template.to_path_buf(),
            reason,
        };

        let json = std::fs::read_to_string(template).map_err(|err| open_err(err.to_string()))?;
        let document = Document::from_json(&json).map_err(|err| open_err(err.to_string()))?;
        debug!(
            paragraphs = document.body.paragraphs().len(),
            media = document.media.len(),
            "Template loaded"
        );

        Ok(Self {
            document,
            target: target.into(),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

impl DocumentSession for JsonFileSession {
    fn document(&self) -> &Document {
        &self.document
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    fn save(&mut self) -> Result<()> {
        let json = self.document.to_json()?;
        write_atomically(&self.target, json.as_bytes())
    }

    fn location(&self) -> String {
        self.target.display().to_string()
    }
}

/// Open a template with the session matching its extension: `.docx`
/// packages or JSON-serialized trees.
pub fn open_template(
    template: impl AsRef<Path>,
    target: impl Into<PathBuf>,
) -> Result<Box<dyn DocumentSession>> {
    let template = template.as_ref();
    let extension = template
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("docx") => Ok(Box::new(DocxSession::open(template, target)?)),
        Some("json") => Ok(Box::new(JsonFileSession::open(template, target)?)),
        _ => Err(DocwerkError::TemplateOpen {
            path: template.to_path_buf(),
            reason: "unsupported template format, expected .docx or .json".into(),
        }),
    }
}

/// Write to a sibling temporary file, then rename it over `target`, so a
/// failed save never leaves a truncated document behind.
pub(crate) fn write_atomically(target: &Path, bytes: &[u8]) -> Result<()> {
    let partial = target.with_extension("partial");
    let persist_err = |source: std::io::Error| DocwerkError::Persistence {
        path: target.to_path_buf(),
        source,
    };

    if let Err(err) = std::fs::write(&partial, bytes) {
        let _ = std::fs::remove_file(&partial);
        return Err(persist_err(err));
    }
    if let Err(err) = std::fs::rename(&partial, target) {
        let _ = std::fs::remove_file(&partial);
        return Err(persist_err(err));
    }

    info!(path = %target.display(), "Document written");
    Ok(())
}
