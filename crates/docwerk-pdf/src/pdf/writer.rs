// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image PDF writer — one-page PDFs whose page is exactly the size of the
// image, built with `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use std::path::Path;

use docwerk_core::error::{DocwerkError, Result};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument};

const MM_PER_INCH: f32 = 25.4;

/// Turns raster images into single-page PDFs.
pub struct ImagePdfWriter {
    /// Resolution the image pixels are laid out at.
    dpi: f32,
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
}

impl ImagePdfWriter {
    /// Create a writer laying pixels out at `dpi`.
    pub fn new(dpi: f32) -> Self {
        Self { dpi, title: None }
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn dpi(&self) -> f32 {
        self.dpi
    }

    /// Page size in millimetres for an image of `width` by `height` pixels.
    pub fn page_size(&self, width: u32, height: u32) -> (Mm, Mm) {
        let to_mm = |px: u32| Mm(px as f32 / self.dpi * MM_PER_INCH);
        (to_mm(width), to_mm(height))
    }

    /// Create a single-page PDF showing the given image edge to edge.
    #[instrument(skip(self, image_bytes), fields(bytes_len = image_bytes.len()))]
    pub fn create_from_image(&self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        if !(self.dpi.is_finite() && self.dpi > 0.0) {
            return Err(DocwerkError::Config(format!(
                "image page DPI must be positive, got {}",
                self.dpi
            )));
        }

        let dynamic_image = ::image::load_from_memory(image_bytes).map_err(|err| {
            DocwerkError::ImageError(format!("failed to decode image for PDF: {}", err))
        })?;

        let (width, height) = (dynamic_image.width(), dynamic_image.height());
        let (page_w, page_h) = self.page_size(width, height);
        let title = self.title.as_deref().unwrap_or("Docwerk Image");

        info!(width, height, dpi = self.dpi, title, "Creating image PDF");

        let raw = RawImage {
            pixels: RawImageData::U8(dynamic_image.to_rgb8().into_raw()),
            width: width as usize,
            height: height as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };

        let mut doc = PdfDocument::new(title);
        let xobject_id = doc.add_image(&raw);

        // At the page's own DPI the image's natural size is the page size.
        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                scale_x: None,
                scale_y: None,
                dpi: Some(self.dpi),
                rotate: None,
            },
        }];

        doc.with_pages(vec![PdfPage::new(page_w, page_h, ops)]);

        debug!(page_w_mm = page_w.0, page_h_mm = page_h.0, "Image placed on page");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);

        Ok(output)
    }

    /// Create an image PDF and write it directly to a file.
    pub fn write_image_to_file(&self, image_bytes: &[u8], path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.create_from_image(image_bytes)?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!("Wrote image PDF to {}", path.as_ref().display());
        Ok(())
    }
}
