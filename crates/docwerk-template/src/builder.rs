// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Replacement content builder — turns a substitution value into the runs and
// graphics that take a tag's place.
//
// Text values are split on the literal two-character marker `\n` (backslash,
// n) as it arrives from form data, never on a real newline. Image values are
// sized in EMU and handed back as a media request; storing the bytes is the
// splicer's job at commit time.

use std::io::Cursor;
use std::sync::Arc;

use thiserror::Error;

use crate::media::MediaRequest;
use crate::model::{Color, Extent, RunProperties};

/// Line separator inside text values: a backslash followed by `n`.
pub const LINE_MARKER: &str = "\\n";

/// EMU per pixel at a nominal 96 DPI (914400 EMU per inch).
pub const EMU_PER_PIXEL: f64 = 914_400.0 / 96.0;
/// EMU per millimetre.
pub const EMU_PER_MILLIMETER: f64 = 36_000.0;

/// Name given to every inserted picture.
const GRAPHIC_NAME: &str = "Inserted Image";

/// Unit of the width and height of an [`ImagePayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    /// Pixels, converted at 96 DPI.
    Pixels,
    /// Physical millimetres.
    Millimeters,
}

impl LengthUnit {
    /// Convert a length in this unit to EMU.
    pub fn to_emu(self, value: f64) -> i64 {
        let factor = match self {
            Self::Pixels => EMU_PER_PIXEL,
            Self::Millimeters => EMU_PER_MILLIMETER,
        };
        (value * factor).round() as i64
    }
}

/// Encoded image bytes plus the size they should occupy in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub bytes: Arc<[u8]>,
    pub width: f64,
    pub height: f64,
    pub unit: LengthUnit,
}

impl ImagePayload {
    pub fn new(bytes: impl Into<Arc<[u8]>>, width: f64, height: f64, unit: LengthUnit) -> Self {
        Self {
            bytes: bytes.into(),
            width,
            height,
            unit,
        }
    }

    /// Size the image by its own pixel dimensions, read from the encoded
    /// header without decoding the pixels.
    pub fn from_encoded(bytes: impl Into<Arc<[u8]>>) -> Result<Self, BuildError> {
        let bytes: Arc<[u8]> = bytes.into();
        let (width, height) = image::ImageReader::new(Cursor::new(&bytes[..]))
            .with_guessed_format()
            .map_err(|err| BuildError::ImageHeader(err.to_string()))?
            .into_dimensions()
            .map_err(|err| BuildError::ImageHeader(err.to_string()))?;
        Ok(Self::new(bytes, width as f64, height as f64, LengthUnit::Pixels))
    }

    /// A square image of `size_mm` millimetres, as used for QR codes.
    pub fn square_mm(bytes: impl Into<Arc<[u8]>>, size_mm: f64) -> Self {
        Self::new(bytes, size_mm, size_mm, LengthUnit::Millimeters)
    }

    /// Width and height in EMU.
    pub fn extent(&self) -> Extent {
        Extent {
            cx: self.unit.to_emu(self.width),
            cy: self.unit.to_emu(self.height),
        }
    }
}

/// Value substituted for a tag.
#[derive(Debug, Clone, PartialEq)]
pub enum SubstitutionValue {
    Text(String),
    Image(ImagePayload),
}

impl Default for SubstitutionValue {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for SubstitutionValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for SubstitutionValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<ImagePayload> for SubstitutionValue {
    fn from(payload: ImagePayload) -> Self {
        Self::Image(payload)
    }
}

/// One node of a replacement, each becoming its own run when spliced.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplacementNode {
    Text {
        properties: Arc<RunProperties>,
        text: String,
    },
    Break {
        properties: Arc<RunProperties>,
    },
    Graphic {
        properties: Arc<RunProperties>,
        request: MediaRequest,
        extent: Extent,
        name: String,
    },
}

/// Ordered nodes replacing one tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplacementUnit {
    pub nodes: Vec<ReplacementNode>,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unsupported substitution value: {0}")]
    UnsupportedValue(String),

    #[error("cannot read image header: {0}")]
    ImageHeader(String),
}

/// Build the replacement for one tag whose anchor run has formatting `anchor`.
pub fn build(
    anchor: &Arc<RunProperties>,
    value: &SubstitutionValue,
) -> Result<ReplacementUnit, BuildError> {
    match value {
        SubstitutionValue::Text(text) => Ok(build_text(anchor, text)),
        SubstitutionValue::Image(payload) => build_image(anchor, payload),
    }
}

/// One run per line with a break between consecutive lines.
///
/// All nodes share one recoloured copy of the anchor formatting, so text
/// typed into a grey or white placeholder still shows up black.
pub fn build_text(anchor: &Arc<RunProperties>, text: &str) -> ReplacementUnit {
    let properties = Arc::new(anchor.with_color(Color::BLACK));
    let mut nodes = Vec::new();
    for (index, line) in text.split(LINE_MARKER).enumerate() {
        if index > 0 {
            nodes.push(ReplacementNode::Break {
                properties: Arc::clone(&properties),
            });
        }
        nodes.push(ReplacementNode::Text {
            properties: Arc::clone(&properties),
            text: line.to_string(),
        });
    }
    ReplacementUnit { nodes }
}

fn build_image(
    anchor: &Arc<RunProperties>,
    payload: &ImagePayload,
) -> Result<ReplacementUnit, BuildError> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(payload.width) || !valid(payload.height) {
        return Err(BuildError::UnsupportedValue(format!(
            "image size {}x{} must be positive",
            payload.width, payload.height
        )));
    }

    let format = image::guess_format(&payload.bytes).map_err(|_| {
        BuildError::UnsupportedValue("image format not recognised".to_string())
    })?;

    Ok(ReplacementUnit {
        nodes: vec![ReplacementNode::Graphic {
            properties: Arc::clone(anchor),
            request: MediaRequest {
                bytes: Arc::clone(&payload.bytes),
                content_type: format.to_mime_type().to_string(),
            },
            extent: payload.extent(),
            name: GRAPHIC_NAME.to_string(),
        }],
    })
}
