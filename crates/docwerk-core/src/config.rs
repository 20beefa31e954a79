// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocwerkError, Result};

/// Persistent application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory that receives every generated document.
    pub output_directory: PathBuf,
    /// Placement and fonts for barcode imprinting on PDFs.
    pub barcode: BarcodeProfile,
    /// Edge length of an inserted QR code, in millimetres.
    pub qr_size_mm: f64,
    /// Resolution assumed when an image becomes a PDF page.
    pub image_page_dpi: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("output"),
            barcode: BarcodeProfile::default(),
            qr_size_mm: 25.0,
            image_page_dpi: 96.0,
        }
    }
}

impl AppConfig {
    /// Load settings from a JSON file.
    ///
    /// A missing file yields the defaults; a file that exists but does not
    /// parse is an error, so a typo never silently resets the profile.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&data)
            .map_err(|err| DocwerkError::Config(format!("{}: {}", path.display(), err)))
    }

    /// Persist settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Create the output directory if it does not exist yet.
    pub fn ensure_output_directory(&self) -> Result<&Path> {
        std::fs::create_dir_all(&self.output_directory)?;
        Ok(&self.output_directory)
    }
}

/// Where and how the barcode stamp is imprinted on every PDF page.
///
/// Positions are millimetres from the top-left page corner; rotation is
/// clockwise in degrees. `text_font` names a PDF base-14 font.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarcodeProfile {
    pub x_mm: f32,
    pub y_mm: f32,
    pub rotation_degrees: f32,
    /// Height of the bars, in points.
    pub barcode_height_pt: f32,
    /// Width of the narrowest bar or space, in points.
    pub module_width_pt: f32,
    /// Repeat the barcode text under the bars.
    pub human_readable: bool,
    pub text_font: String,
    pub text_font_size: f32,
    /// Vertical gap between the stamp's lines, in points.
    pub line_gap_pt: f32,
}

impl Default for BarcodeProfile {
    fn default() -> Self {
        Self {
            x_mm: 10.0,
            y_mm: 90.0,
            rotation_degrees: 90.0,
            barcode_height_pt: 10.0,
            module_width_pt: 0.72,
            human_readable: true,
            text_font: "Helvetica".into(),
            text_font_size: 4.0,
            line_gap_pt: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "qr_size_mm": 30.0, "barcode": { "rotation_degrees": -90.0 } }"#)
            .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.qr_size_mm, 30.0);
        assert_eq!(config.barcode.rotation_degrees, -90.0);
        assert_eq!(config.barcode.x_mm, 10.0);
        assert_eq!(config.output_directory, PathBuf::from("output"));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(DocwerkError::Config(_))));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.barcode.barcode_height_pt = 20.0;
        config.barcode.human_readable = false;
        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }
}
