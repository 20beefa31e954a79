// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR rendering — encodes text as a QR symbol and rasterises it to PNG.

use std::io::Cursor;

use docwerk_core::error::{DocwerkError, Result};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use qrcode::{Color, QrCode};
use tracing::debug;

/// Light modules around the symbol, as the symbology requires.
const QUIET_ZONE: u32 = 4;
/// Pixels per module edge.
const MODULE_PIXELS: u32 = 8;

/// Encode `text` and return the symbol as a greyscale PNG.
pub fn render_png(text: &str) -> Result<Vec<u8>> {
    if text.is_empty() {
        return Err(DocwerkError::InvalidData("QR text is required".into()));
    }
    let code = QrCode::new(text.as_bytes())
        .map_err(|err| DocwerkError::InvalidData(format!("cannot encode QR code: {err}")))?;

    let modules = code.width() as u32;
    let colors = code.to_colors();
    let side = (modules + 2 * QUIET_ZONE) * MODULE_PIXELS;
    let raster = GrayImage::from_fn(side, side, |x, y| {
        let module = |pixel: u32| {
            (pixel / MODULE_PIXELS)
                .checked_sub(QUIET_ZONE)
                .filter(|m| *m < modules)
        };
        let dark = match (module(x), module(y)) {
            (Some(mx), Some(my)) => colors[(my * modules + mx) as usize] == Color::Dark,
            _ => false,
        };
        Luma([if dark { 0 } else { 255 }])
    });

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(raster)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|err| DocwerkError::ImageError(err.to_string()))?;
    debug!(modules, side, bytes = png.len(), "QR code rendered");
    Ok(png)
}
