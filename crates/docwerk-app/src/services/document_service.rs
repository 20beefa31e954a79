// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document service — the top-level operations, each reported as a
// `ServiceOutcome` rather than an error so callers always get a status,
// a message and, on success, the path of the file written.
//
// Every output is named `<request uuid>_<kind>.<ext>` inside the configured
// output directory, unless the caller names the output explicitly. Filled
// templates keep the extension of their template.

use std::path::{Path, PathBuf};

use docwerk_core::AppConfig;
use docwerk_core::error::{DocwerkError, Result};
use docwerk_core::types::{OutputKind, RequestId, ServiceOutcome};
use docwerk_pdf::{PdfGenerator, PdfStamper};
use docwerk_template::{FillReport, ImagePayload, Substitutions, TemplateEngine, open_template};
use tracing::{error, info, instrument};

use crate::services::qr;

/// Tag replaced by `replace_qr`.
pub const QR_TAG: &str = "QR";

/// Entry point for every document operation.
pub struct DocumentService {
    config: AppConfig,
    engine: TemplateEngine,
}

impl DocumentService {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            engine: TemplateEngine::new(),
        }
    }

    // -- Templates ------------------------------------------------------------

    /// Fill every tag of `template` from `values`.
    #[instrument(skip_all, fields(template = %template.display(), keys = values.len()))]
    pub fn fill_template(&self, template: &Path, values: &Substitutions) -> ServiceOutcome {
        let result = self.fill(template, values, OutputKind::Filled);
        report_fill(result, "Template filled successfully.", "Error filling template.")
    }

    /// Fill `template` from a JSON data file.
    pub fn fill_template_from_file(&self, template: &Path, data: &Path) -> ServiceOutcome {
        match crate::services::substitution_data::load(data) {
            Ok(values) => self.fill_template(template, &values),
            Err(err) => failure("Error reading substitution data.", &err),
        }
    }

    /// Encode `qr_text` as a QR code and put it in place of `{QR}`, as a
    /// square of the configured size.
    #[instrument(skip_all, fields(template = %template.display()))]
    pub fn replace_qr(&self, template: &Path, qr_text: &str) -> ServiceOutcome {
        let result = qr::render_png(qr_text).and_then(|png| self.fill_qr(template, png));
        report_fill(result, "QR code inserted successfully.", "Error inserting QR code.")
    }

    /// Like `replace_qr`, with a QR code already rendered to an image file.
    #[instrument(skip_all, fields(template = %template.display()))]
    pub fn replace_qr_image(&self, template: &Path, qr_image: &Path) -> ServiceOutcome {
        let result = std::fs::read(qr_image)
            .map_err(DocwerkError::from)
            .and_then(|bytes| self.fill_qr(template, bytes));
        report_fill(result, "QR code inserted successfully.", "Error inserting QR code.")
    }

    fn fill_qr(&self, template: &Path, image: Vec<u8>) -> Result<(PathBuf, FillReport)> {
        let mut values = Substitutions::new();
        values.insert_image(QR_TAG, ImagePayload::square_mm(image, self.config.qr_size_mm));
        self.fill(template, &values, OutputKind::Qr)
    }

    /// Replace the tag `tag` with the image at `image_path`, sized by its own
    /// pixel dimensions. The tag may be given with or without braces.
    #[instrument(skip_all, fields(template = %template.display(), tag = tag))]
    pub fn replace_image(&self, template: &Path, tag: &str, image_path: &Path) -> ServiceOutcome {
        let result = normalize_tag(tag).and_then(|key| {
            let bytes = std::fs::read(image_path)?;
            let payload = ImagePayload::from_encoded(bytes)
                .map_err(|err| DocwerkError::ImageError(err.to_string()))?;
            let mut values = Substitutions::new();
            values.insert_image(key, payload);
            self.fill(template, &values, OutputKind::Image)
        });
        report_fill(result, "Image inserted successfully.", "Error inserting image.")
    }

    fn fill(
        &self,
        template: &Path,
        values: &Substitutions,
        kind: OutputKind,
    ) -> Result<(PathBuf, FillReport)> {
        let extension = template
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let target = self.output_path(kind)?.with_extension(extension);
        let mut session = open_template(template, &target)?;
        let report = self.engine.fill_session(session.as_mut(), values)?;
        Ok((target, report))
    }

    // -- PDF ------------------------------------------------------------------

    /// Convert and merge `inputs` into one PDF, written to `output` or to a
    /// fresh file in the output directory.
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    pub fn generate_pdf(&self, inputs: &[PathBuf], output: Option<&Path>) -> ServiceOutcome {
        match self.try_generate_pdf(inputs, output) {
            Ok(path) => {
                info!(path = %path.display(), "PDF generated");
                ServiceOutcome::success("Files processed successfully.", path)
            }
            Err(err) => failure("Error generating PDF.", &err),
        }
    }

    /// Imprint `barcode_text` and `reg_number` on every page of `pdf`.
    #[instrument(skip_all, fields(pdf = %pdf.display(), barcode = barcode_text))]
    pub fn imprint_barcode(
        &self,
        pdf: &Path,
        barcode_text: &str,
        reg_number: &str,
    ) -> ServiceOutcome {
        match self.try_imprint_barcode(pdf, barcode_text, reg_number) {
            Ok(path) => {
                info!(path = %path.display(), "Barcode imprinted");
                ServiceOutcome::success("Barcode imprinted successfully.", path)
            }
            Err(err) => failure("Error imprinting barcode on PDF.", &err),
        }
    }

    fn try_generate_pdf(&self, inputs: &[PathBuf], output: Option<&Path>) -> Result<PathBuf> {
        let pdf = PdfGenerator::new(self.config.image_page_dpi).generate(inputs)?;
        let target = match output {
            Some(path) => path.to_path_buf(),
            None => self.output_path(OutputKind::Merged)?,
        };
        std::fs::write(&target, pdf)?;
        Ok(target)
    }

    fn try_imprint_barcode(
        &self,
        pdf: &Path,
        barcode_text: &str,
        reg_number: &str,
    ) -> Result<PathBuf> {
        if barcode_text.is_empty() {
            return Err(DocwerkError::InvalidData("barcode text is required".into()));
        }
        let target = self.output_path(OutputKind::Barcode)?;
        PdfStamper::new(self.config.barcode.clone())
            .imprint_barcode_file(pdf, &target, barcode_text, reg_number)?;
        Ok(target)
    }

    fn output_path(&self, kind: OutputKind) -> Result<PathBuf> {
        let directory = self.config.ensure_output_directory()?;
        Ok(RequestId::new().output_path(directory, kind))
    }
}

/// Strip surrounding whitespace and one pair of braces from a tag name.
fn normalize_tag(tag: &str) -> Result<&str> {
    let trimmed = tag.trim();
    let key = trimmed
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(trimmed);
    if key.is_empty() {
        return Err(DocwerkError::InvalidData("tag name must not be empty".into()));
    }
    Ok(key)
}

fn report_fill(
    result: Result<(PathBuf, FillReport)>,
    success: &str,
    failed: &str,
) -> ServiceOutcome {
    match result {
        Ok((path, report)) => {
            info!(path = %path.display(), replaced = report.replaced, "Template written");
            let warnings = report
                .skipped
                .iter()
                .map(|skipped| format!("{}: {}", skipped.key, skipped.reason))
                .collect();
            ServiceOutcome::success(success, path).with_warnings(warnings)
        }
        Err(err) => failure(failed, &err),
    }
}

fn failure(message: &str, err: &DocwerkError) -> ServiceOutcome {
    error!(error = %err, "{message}");
    ServiceOutcome::failure(format!("{message} {err}"))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use std::io::Write;

    use docwerk_template::{Document, DocumentSession, DocxSession};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use super::*;

    struct Fixture {
        dir: tempfile::TempDir,
        service: DocumentService,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = AppConfig {
                output_directory: dir.path().join("out"),
                ..AppConfig::default()
            };
            Self {
                dir,
                service: DocumentService::new(config),
            }
        }

        fn template(&self, text: &str) -> PathBuf {
            let mut doc = Document::new();
            let run = doc.new_run(Arc::default(), &[text]);
            doc.push_paragraph(vec![run]);
            let path = self.dir.path().join("template.json");
            std::fs::write(&path, doc.to_json().unwrap()).unwrap();
            path
        }

        /// A one-part package holding `body` as its main document.
        fn docx(&self, body: &str) -> PathBuf {
            let document = format!(
                concat!(
                    r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
                    r#"<w:body>{}</w:body></w:document>"#
                ),
                body
            );
            let content_types = concat!(
                r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
                r#"<Default Extension="xml" ContentType="application/xml"/></Types>"#
            );
            let path = self.dir.path().join("template.docx");
            let mut writer = ZipWriter::new(std::fs::File::create(&path).unwrap());
            for (name, content) in [
                ("[Content_Types].xml", content_types.to_string()),
                ("word/document.xml", document),
            ] {
                writer.start_file(name, SimpleFileOptions::default()).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
            path
        }

        fn png(&self, name: &str, width: u32, height: u32) -> PathBuf {
            let mut buffer = Vec::new();
            DynamicImage::ImageRgb8(RgbImage::new(width, height))
                .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
                .unwrap();
            let path = self.dir.path().join(name);
            std::fs::write(&path, buffer).unwrap();
            path
        }
    }

    fn saved(outcome: &ServiceOutcome) -> Document {
        let path = outcome.output_path.as_ref().unwrap();
        Document::from_json(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn fill_writes_a_uuid_named_output() {
        let fx = Fixture::new();
        let template = fx.template("Dear {Name}");
        let values: Substitutions = [("Name", "Ada")].into_iter().collect();

        let outcome = fx.service.fill_template(&template, &values);

        assert!(outcome.is_success(), "{}", outcome.message);
        let path = outcome.output_path.clone().unwrap();
        assert!(path.starts_with(fx.dir.path().join("out")));
        assert!(path.to_string_lossy().ends_with("_filled.json"));
        assert_eq!(saved(&outcome).body.paragraphs()[0].plain_text(), "Dear Ada");
    }

    #[test]
    fn missing_template_is_a_failure_outcome() {
        let fx = Fixture::new();
        let outcome = fx
            .service
            .fill_template(&fx.dir.path().join("absent.json"), &Substitutions::new());
        assert!(!outcome.is_success());
        assert!(outcome.output_path.is_none());
        assert!(outcome.message.starts_with("Error filling template."));
    }

    #[test]
    fn qr_text_becomes_one_square_picture() {
        let fx = Fixture::new();
        let template = fx.template("Scan: {QR}");

        let outcome = fx.service.replace_qr(&template, "https://example.org/r/42");

        assert!(outcome.is_success(), "{}", outcome.message);
        assert!(outcome.warnings.is_empty());
        assert!(outcome.output_path.as_ref().unwrap().to_string_lossy().ends_with("_qr.json"));
        let doc = saved(&outcome);
        let paragraph = doc.body.paragraphs()[0];
        assert_eq!(paragraph.drawings().count(), 1);
        let drawing = paragraph.drawings().next().unwrap();
        assert_eq!(drawing.extent.cx, 900_000);
        assert_eq!(drawing.extent.cy, 900_000);

        let part = doc.media.get(&drawing.media).unwrap();
        assert_eq!(part.content_type, "image/png");
        assert_eq!(part.bytes, qr::render_png("https://example.org/r/42").unwrap());
    }

    #[test]
    fn empty_qr_text_fails() {
        let fx = Fixture::new();
        let outcome = fx.service.replace_qr(&fx.template("{QR}"), "");
        assert!(!outcome.is_success());
        assert!(outcome.message.starts_with("Error inserting QR code."));
    }

    #[test]
    fn ready_made_qr_image_is_sized_like_rendered_ones() {
        let fx = Fixture::new();
        let template = fx.template("{QR}");
        let qr = fx.png("qr.png", 21, 21);

        let outcome = fx.service.replace_qr_image(&template, &qr);

        assert!(outcome.is_success(), "{}", outcome.message);
        let doc = saved(&outcome);
        let drawing = doc.body.paragraphs()[0].drawings().next().unwrap().clone();
        assert_eq!(drawing.extent.cx, 900_000);
    }

    #[test]
    fn docx_templates_are_filled_into_docx_outputs() {
        let fx = Fixture::new();
        let template =
            fx.docx(r#"<w:p><w:r><w:t>Dear {Na</w:t></w:r><w:r><w:t>me}</w:t></w:r></w:p>"#);
        let values: Substitutions = [("Name", "Ada")].into_iter().collect();

        let outcome = fx.service.fill_template(&template, &values);

        assert!(outcome.is_success(), "{}", outcome.message);
        let path = outcome.output_path.unwrap();
        assert!(path.to_string_lossy().ends_with("_filled.docx"));
        let reopened = DocxSession::open(&path, fx.dir.path().join("unused.docx")).unwrap();
        assert_eq!(reopened.document().body.paragraphs()[0].plain_text(), "Dear Ada");
    }

    #[test]
    fn image_tag_accepts_braces() {
        let fx = Fixture::new();
        let template = fx.template("Logo: {Logo}");
        let image = fx.png("logo.png", 10, 10);

        let outcome = fx.service.replace_image(&template, "{Logo}", &image);

        assert!(outcome.is_success(), "{}", outcome.message);
        let doc = saved(&outcome);
        let drawing = doc.body.paragraphs()[0].drawings().next().unwrap().clone();
        assert_eq!(drawing.extent.cx, 95_250);
        assert_eq!(doc.media.len(), 1);
    }

    #[test]
    fn unreadable_image_is_reported_as_warning() {
        let fx = Fixture::new();
        let template = fx.template("{QR}");
        let not_an_image = fx.dir.path().join("qr.png");
        std::fs::write(&not_an_image, b"plain text").unwrap();

        let outcome = fx.service.replace_qr_image(&template, &not_an_image);

        assert!(outcome.is_success());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].starts_with("QR: "));
        assert_eq!(saved(&outcome).body.paragraphs()[0].plain_text(), "{QR}");
    }

    #[test]
    fn tag_names_are_normalized() {
        assert_eq!(normalize_tag("{Name}").unwrap(), "Name");
        assert_eq!(normalize_tag("  Name ").unwrap(), "Name");
        assert_eq!(normalize_tag("{Name").unwrap(), "{Name");
        assert!(normalize_tag("{}").is_err());
        assert!(normalize_tag("   ").is_err());
    }

    #[test]
    fn generate_and_stamp_pdf() {
        let fx = Fixture::new();
        let first = fx.png("a.png", 20, 20);
        let second = fx.png("b.png", 20, 10);

        let merged = fx.service.generate_pdf(&[first, second], None);
        assert!(merged.is_success(), "{}", merged.message);
        let merged_path = merged.output_path.unwrap();
        assert!(merged_path.to_string_lossy().ends_with("_merged.pdf"));

        let stamped = fx.service.imprint_barcode(&merged_path, "*123*", "R-1");
        assert!(stamped.is_success(), "{}", stamped.message);
        assert!(
            stamped
                .output_path
                .unwrap()
                .to_string_lossy()
                .ends_with("_barcode.pdf")
        );
    }

    #[test]
    fn explicit_merge_output_is_respected() {
        let fx = Fixture::new();
        let input = fx.png("a.png", 4, 4);
        let output = fx.dir.path().join("combined.pdf");

        let outcome = fx.service.generate_pdf(&[input], Some(&output));

        assert_eq!(outcome.output_path.as_deref(), Some(output.as_path()));
        assert!(output.exists());
    }

    #[test]
    fn empty_barcode_is_rejected() {
        let fx = Fixture::new();
        let outcome = fx.service.imprint_barcode(&fx.dir.path().join("x.pdf"), "", "R");
        assert!(!outcome.is_success());
    }

    #[test]
    fn empty_input_list_fails() {
        let fx = Fixture::new();
        assert!(!fx.service.generate_pdf(&[], None).is_success());
    }
}
