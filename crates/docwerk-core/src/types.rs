// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Docwerk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one document-automation request.
///
/// Every generated file is named after the request that produced it, so two
/// requests against the same template never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// File name for an output of this request, e.g. `<uuid>_qr.json`.
    pub fn output_file_name(&self, kind: OutputKind) -> String {
        format!("{}_{}.{}", self.0, kind.suffix(), kind.extension())
    }

    /// Full output path inside `directory`.
    pub fn output_path(&self, directory: &Path, kind: OutputKind) -> PathBuf {
        directory.join(self.output_file_name(kind))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The different documents Docwerk writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputKind {
    /// Template with every tag substituted.
    Filled,
    /// Template with `{QR}` replaced by a QR raster.
    Qr,
    /// Template with one tag replaced by an image.
    Image,
    /// PDF with barcode text imprinted on every page.
    Barcode,
    /// Several inputs merged into one PDF.
    Merged,
}

impl OutputKind {
    fn suffix(&self) -> &'static str {
        match self {
            Self::Filled => "filled",
            Self::Qr => "qr",
            Self::Image => "image",
            Self::Barcode => "barcode",
            Self::Merged => "merged",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Self::Filled | Self::Qr | Self::Image => "json",
            Self::Barcode | Self::Merged => "pdf",
        }
    }
}

/// Supported input document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    Pdf,
    Jpeg,
    Png,
    /// Serialized word-processing template.
    Template,
    /// Office formats that need an external converter (DOCX, XLSX, MSG, ...).
    OfficeDelegate,
}

impl DocumentType {
    /// MIME type string.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Template => "application/json",
            Self::OfficeDelegate => "application/octet-stream",
        }
    }

    /// Infer document type from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "json" => Some(Self::Template),
            "docx" | "doc" | "xlsx" | "xls" | "pptx" | "ppt" | "msg" | "odt" => {
                Some(Self::OfficeDelegate)
            }
            _ => None,
        }
    }

    /// Infer document type from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Outcome of a service operation, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Success,
    Failure,
}

/// Result envelope for every top-level operation: a status, a message for
/// humans and, on success, where the output was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOutcome {
    pub status: OutcomeStatus,
    pub message: String,
    pub output_path: Option<PathBuf>,
    /// Tags that could not be substituted, as `key: reason` lines.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ServiceOutcome {
    pub fn success(message: impl Into<String>, output_path: PathBuf) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: message.into(),
            output_path: Some(output_path),
            warnings: Vec::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Failure,
            message: message.into(),
            output_path: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_carry_request_and_kind() {
        let id = RequestId::new();
        let name = id.output_file_name(OutputKind::Barcode);
        assert_eq!(name, format!("{}_barcode.pdf", id));

        let path = id.output_path(Path::new("/srv/out"), OutputKind::Qr);
        assert_eq!(path, PathBuf::from(format!("/srv/out/{}_qr.json", id)));
    }

    #[test]
    fn document_type_from_path() {
        assert_eq!(DocumentType::from_path(Path::new("a/scan.JPG")), Some(DocumentType::Jpeg));
        assert_eq!(
            DocumentType::from_path(Path::new("letter.docx")),
            Some(DocumentType::OfficeDelegate)
        );
        assert_eq!(DocumentType::from_path(Path::new("README")), None);
    }

    #[test]
    fn outcome_serializes_without_empty_warnings() {
        let outcome = ServiceOutcome::failure("nope");
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(!json.contains("warnings"));
        assert!(!outcome.is_success());
    }
}
