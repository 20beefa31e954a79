// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Barcode stamper — imprint a registration number and a Code 128 barcode onto
// every page of an existing PDF.
//
// Positions come from the `BarcodeProfile` in millimetres measured from the
// top-left corner of the page, with the stamp rotated clockwise around that
// point. The symbol is a one-row greyscale image scaled to the bar height, so
// every bar edge stays sharp at any zoom; text uses a PDF base-14 font.

use std::path::Path;

use barcoders::sym::code128::Code128;
use docwerk_core::config::BarcodeProfile;
use docwerk_core::error::{DocwerkError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument};

use super::inherited_attribute;

/// Points per millimetre.
const PT_PER_MM: f32 = 72.0 / 25.4;

/// Page height used when no MediaBox can be found (A4).
const FALLBACK_PAGE_HEIGHT_PT: f32 = 842.0;

/// Resource names of the stamp image and font, chosen to avoid clashing with
/// names already used by the page.
const BARCODE_IMAGE_KEY: &str = "DwStampBarcode";
const TEXT_FONT_KEY: &str = "DwStampText";

/// Light modules on either side of the bars.
const QUIET_ZONE_MODULES: usize = 10;

/// Code 128 character set selectors understood by the encoder.
const CODE_SET_B: char = 'Ɓ';
const CODE_SET_C: char = 'Ć';

/// Stamps barcodes onto PDF pages according to a [`BarcodeProfile`].
pub struct PdfStamper {
    profile: BarcodeProfile,
}

/// Objects added once per document and shared by every page.
#[derive(Clone, Copy)]
struct StampResources {
    barcode: ObjectId,
    /// Width of the symbol image in modules, quiet zones included.
    barcode_modules: usize,
    text: ObjectId,
}

impl PdfStamper {
    pub fn new(profile: BarcodeProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &BarcodeProfile {
        &self.profile
    }

    /// Imprint `reg_number` and `barcode_text` on every page of `pdf`.
    ///
    /// `reg_number` is drawn at the stamp origin in the text font, the
    /// Code 128 symbol for `barcode_text` the profile's gap below it, and,
    /// when the profile asks for it, `barcode_text` again under the bars.
    /// An empty `reg_number` draws only the barcode.
    #[instrument(skip(self, pdf), fields(bytes_len = pdf.len(), barcode = barcode_text))]
    pub fn imprint_barcode(
        &self,
        pdf: &[u8],
        barcode_text: &str,
        reg_number: &str,
    ) -> Result<Vec<u8>> {
        let mut doc = Document::load_mem(pdf).map_err(|err| {
            DocwerkError::PdfError(format!("failed to load PDF for stamping: {}", err))
        })?;

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(DocwerkError::PdfError("document has no pages".to_string()));
        }

        let modules = code128_modules(barcode_text)?;
        let (image, barcode_modules) = barcode_image(&modules);
        let resources = StampResources {
            barcode: doc.add_object(image),
            barcode_modules,
            text: doc.add_object(base14_font(&self.profile.text_font)),
        };

        info!(pages = pages.len(), modules = modules.len(), "Imprinting barcode");
        for page_id in &pages {
            self.stamp_page(&mut doc, *page_id, resources, barcode_text, reg_number)?;
        }

        let mut output = Vec::new();
        doc.save_to(&mut output).map_err(|err| {
            DocwerkError::PdfError(format!("failed to serialise stamped PDF: {}", err))
        })?;

        debug!(output_bytes = output.len(), "Barcode imprinted");
        Ok(output)
    }

    /// Read `input`, stamp it, and write the result to `output`.
    pub fn imprint_barcode_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        barcode_text: &str,
        reg_number: &str,
    ) -> Result<()> {
        let bytes = std::fs::read(input.as_ref())?;
        let stamped = self.imprint_barcode(&bytes, barcode_text, reg_number)?;
        std::fs::write(output.as_ref(), &stamped)?;
        info!("Wrote stamped PDF to {}", output.as_ref().display());
        Ok(())
    }

    // -- Per page -------------------------------------------------------------

    fn stamp_page(
        &self,
        doc: &mut Document,
        page_id: ObjectId,
        stamp: StampResources,
        barcode_text: &str,
        reg_number: &str,
    ) -> Result<()> {
        let page = doc
            .get_dictionary(page_id)
            .map_err(|err| {
                DocwerkError::PdfError(format!("cannot read page object {:?}: {}", page_id, err))
            })?
            .clone();

        let height = page_height(doc, &page);
        let mut resources = page_resources(doc, &page);
        let mut font_dict = resource_category(doc, &resources, b"Font");
        font_dict.set(TEXT_FONT_KEY, Object::Reference(stamp.text));
        resources.set("Font", Object::Dictionary(font_dict));
        let mut xobject_dict = resource_category(doc, &resources, b"XObject");
        xobject_dict.set(BARCODE_IMAGE_KEY, Object::Reference(stamp.barcode));
        resources.set("XObject", Object::Dictionary(xobject_dict));

        // Wrap the existing content in q/Q so its graphics state cannot leak
        // into the stamp.
        let open = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let content = self
            .stamp_content(height, stamp.barcode_modules, barcode_text, reg_number)
            .encode()
            .map_err(|err| DocwerkError::PdfError(format!("failed to encode stamp: {}", err)))?;
        let content = doc.add_object(Stream::new(Dictionary::new(), content));

        let mut contents = vec![Object::Reference(open)];
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => contents.push(Object::Reference(*id)),
            Ok(Object::Array(items)) => contents.extend(items.iter().cloned()),
            _ => {}
        }
        contents.push(Object::Reference(content));

        let page_dict = doc.get_dictionary_mut(page_id).map_err(|err| {
            DocwerkError::PdfError(format!("cannot update page {:?}: {}", page_id, err))
        })?;
        page_dict.set("Contents", Object::Array(contents));
        page_dict.set("Resources", Object::Dictionary(resources));

        debug!(?page_id, height, "Page stamped");
        Ok(())
    }

    /// Content stream drawn after the page's own content.
    fn stamp_content(
        &self,
        page_height: f32,
        barcode_modules: usize,
        barcode_text: &str,
        reg_number: &str,
    ) -> Content {
        let profile = &self.profile;
        let angle = (-profile.rotation_degrees).to_radians();
        let (sin, cos) = angle.sin_cos();
        let tx = profile.x_mm * PT_PER_MM;
        let ty = page_height - profile.y_mm * PT_PER_MM;
        let bars_bottom = -(profile.line_gap_pt + profile.barcode_height_pt);
        let bars_width = barcode_modules as f32 * profile.module_width_pt;

        let mut operations = vec![
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    cos.into(),
                    sin.into(),
                    (-sin).into(),
                    cos.into(),
                    tx.into(),
                    ty.into(),
                ],
            ),
            Operation::new("g", vec![0.into()]),
        ];
        if !reg_number.is_empty() {
            operations.extend(text_ops(TEXT_FONT_KEY, profile.text_font_size, 0.0, reg_number));
        }
        operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    bars_width.into(),
                    0.into(),
                    0.into(),
                    profile.barcode_height_pt.into(),
                    0.into(),
                    bars_bottom.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(BARCODE_IMAGE_KEY.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
        if profile.human_readable {
            let caption = bars_bottom - profile.line_gap_pt - profile.text_font_size;
            operations.extend(text_ops(
                TEXT_FONT_KEY,
                profile.text_font_size,
                caption,
                barcode_text,
            ));
        }
        operations.push(Operation::new("Q", vec![]));

        Content { operations }
    }
}

fn text_ops(font_key: &str, size: f32, y: f32, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(font_key.as_bytes().to_vec()), size.into()]),
        Operation::new("Td", vec![0.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// Bar and space modules of the Code 128 symbol for `text`, 1 for a bar.
///
/// Even-length digit strings use set C, two digits per symbol character;
/// everything else uses set B.
fn code128_modules(text: &str) -> Result<Vec<u8>> {
    let symbol = Code128::new(symbol_data(text)).map_err(|err| {
        DocwerkError::InvalidData(format!("cannot encode {text:?} as Code 128: {err}"))
    })?;
    Ok(symbol.encode())
}

fn symbol_data(text: &str) -> String {
    let numeric =
        !text.is_empty() && text.len() % 2 == 0 && text.bytes().all(|b| b.is_ascii_digit());
    let set = if numeric { CODE_SET_C } else { CODE_SET_B };
    format!("{set}{text}")
}

/// One-row DeviceGray image of the symbol with its quiet zones, and its
/// width in modules.
fn barcode_image(modules: &[u8]) -> (Stream, usize) {
    let mut row = vec![255u8; modules.len() + 2 * QUIET_ZONE_MODULES];
    for (index, module) in modules.iter().enumerate() {
        if *module == 1 {
            row[QUIET_ZONE_MODULES + index] = 0;
        }
    }
    let width = row.len();

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(1));
    dict.set("ColorSpace", Object::Name(b"DeviceGray".to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    (Stream::new(dict, row), width)
}

fn base14_font(base_font: &str) -> Dictionary {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(base_font.as_bytes().to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    font
}

/// Height of the page's MediaBox in points.
fn page_height(doc: &Document, page: &Dictionary) -> f32 {
    let media_box = match inherited_attribute(doc, page, b"MediaBox") {
        Some(Object::Reference(id)) => doc.get_object(*id).ok(),
        other => other,
    };
    let corners: Option<Vec<f32>> = media_box
        .and_then(|object| object.as_array().ok())
        .and_then(|items| items.iter().map(|item| item.as_float().ok()).collect());

    match corners.as_deref() {
        Some([_, y0, _, y1]) => (y1 - y0).abs(),
        _ => FALLBACK_PAGE_HEIGHT_PT,
    }
}

/// One category (`Font`, `XObject`, ...) of a resource dictionary as an
/// owned dictionary, following an indirect reference.
fn resource_category(doc: &Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    match resources.get(key) {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_default(),
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    }
}

/// The page's effective resources as an owned dictionary.
fn page_resources(doc: &Document, page: &Dictionary) -> Dictionary {
    match inherited_attribute(doc, page, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        Some(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_default(),
        _ => Dictionary::new(),
    }
}
