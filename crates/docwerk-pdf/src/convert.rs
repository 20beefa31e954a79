// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF generation — turn a list of input files into one merged PDF.
//
// Each input is routed by its extension: PDFs pass through untouched, PNG and
// JPEG images become one page each, and anything else is refused. Office
// formats are converted by an external service before they reach us.

use std::path::Path;

use tracing::{debug, info, instrument};

use docwerk_core::error::{DocwerkError, Result};
use docwerk_core::types::DocumentType;

use crate::pdf::{ImagePdfWriter, PdfMerger};

/// Routes input documents to PDF and merges them.
pub struct PdfGenerator {
    image_writer: ImagePdfWriter,
}

impl PdfGenerator {
    /// Create a generator laying image pages out at `image_dpi`.
    pub fn new(image_dpi: f32) -> Self {
        Self {
            image_writer: ImagePdfWriter::new(image_dpi),
        }
    }

    /// Convert one document of a known type to PDF bytes.
    pub fn to_pdf(&self, document_bytes: &[u8], source_type: DocumentType) -> Result<Vec<u8>> {
        match source_type {
            DocumentType::Pdf => {
                debug!("PDF input passes through");
                Ok(document_bytes.to_vec())
            }
            DocumentType::Jpeg | DocumentType::Png => {
                self.image_writer.create_from_image(document_bytes)
            }
            DocumentType::Template => Err(DocwerkError::UnsupportedDocument(
                "templates must be filled and exported before PDF generation".into(),
            )),
            DocumentType::OfficeDelegate => Err(DocwerkError::UnsupportedDocument(
                "office documents are converted by the external office service".into(),
            )),
        }
    }

    /// Convert every input in order and merge the results into one PDF.
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    pub fn generate<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<Vec<u8>> {
        if inputs.is_empty() {
            return Err(DocwerkError::InvalidData(
                "no input documents to generate a PDF from".into(),
            ));
        }

        let mut merger = PdfMerger::new();
        for input in inputs {
            let path = input.as_ref();
            let source_type = route(path)?;
            let bytes = std::fs::read(path)?;
            let pdf = self.to_pdf(&bytes, source_type)?;
            merger.add_bytes(&pdf)?;
            debug!(path = %path.display(), kind = source_type.mime_type(), "Input converted");
        }

        info!(pages = merger.page_count(), "Generating merged PDF");
        merger.merge()
    }
}

/// Decide how an input file is handled from its extension.
pub fn route(path: &Path) -> Result<DocumentType> {
    DocumentType::from_path(path).ok_or_else(|| {
        DocwerkError::UnsupportedDocument(format!(
            "cannot generate a PDF from {}",
            path.display()
        ))
    })
}

/// Convenience wrapper: generate a merged PDF from `inputs` at `image_dpi`.
pub fn generate_pdf<P: AsRef<Path>>(inputs: &[P], image_dpi: f32) -> Result<Vec<u8>> {
    PdfGenerator::new(image_dpi).generate(inputs)
}
