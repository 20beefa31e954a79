// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docwerk-pdf — PDF operations for Docwerk.
//
// Provides page concatenation across documents, barcode imprinting on every
// page, single-page PDFs from raster images, and the routing that turns a
// list of mixed input files into one merged PDF.

pub mod convert;
pub mod pdf;

// Re-export the primary structs so callers can use `docwerk_pdf::PdfMerger` etc.
pub use convert::{PdfGenerator, generate_pdf};
pub use pdf::merge::PdfMerger;
pub use pdf::stamp::PdfStamper;
pub use pdf::writer::ImagePdfWriter;
