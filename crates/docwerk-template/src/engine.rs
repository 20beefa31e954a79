// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Template engine — flatten, scan, build and splice, paragraph by paragraph.
//
// Per-tag problems never abort a fill: they are collected in the returned
// `FillReport`. Only a failed save surfaces as an error.

use std::collections::HashMap;

use docwerk_core::error::Result;
use tracing::{info, instrument};

use crate::builder::{self, ImagePayload, SubstitutionValue};
use crate::model::{Document, NodeId, Paragraph, SpliceContext};
use crate::observer::{FillObserver, TracingObserver};
use crate::scanner::scan;
use crate::session::DocumentSession;
use crate::splice::Piece;
use crate::stream::{FragmentEdit, LogicalStream, apply_edits, coalesce};

/// Key to value mapping for one fill. Keys are matched case-sensitively.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    values: HashMap<String, SubstitutionValue>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SubstitutionValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn insert_text(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.insert(key, SubstitutionValue::Text(text.into()));
    }

    pub fn insert_image(&mut self, key: impl Into<String>, payload: ImagePayload) {
        self.insert(key, SubstitutionValue::Image(payload));
    }

    pub fn get(&self, key: &str) -> Option<&SubstitutionValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Substitutions
where
    K: Into<String>,
    V: Into<SubstitutionValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut substitutions = Self::new();
        for (key, value) in iter {
            substitutions.insert(key, value);
        }
        substitutions
    }
}

/// Why a tag was left in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The tag's fragment had no run to splice into.
    MissingAnchor,
    /// The value could not be turned into document content.
    UnsupportedValueKind(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingAnchor => f.write_str("missing anchor run"),
            Self::UnsupportedValueKind(detail) => write!(f, "unsupported value: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMatch {
    pub key: String,
    pub paragraph: NodeId,
    pub reason: SkipReason,
}

/// Summary of one fill.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Tags replaced by their value.
    pub replaced: usize,
    /// Tags left in place, in document order.
    pub skipped: Vec<SkippedMatch>,
}

impl FillReport {
    /// Every tag the scanner found, replaced or not.
    pub fn matches(&self) -> usize {
        self.replaced + self.skipped.len()
    }
}

/// Substitutes `{key}` tags throughout a document.
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine<O = TracingObserver> {
    observer: O,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<O: FillObserver> TemplateEngine<O> {
    pub fn with_observer(observer: O) -> Self {
        Self { observer }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Replace every tag in `document` in place.
    ///
    /// Values are inserted as literal text and never rescanned, so a value
    /// that itself contains `{x}` survives as text.
    #[instrument(skip_all, fields(keys = values.len()))]
    pub fn fill(&self, document: &mut Document, values: &Substitutions) -> FillReport {
        let (body, mut ctx) = document.split_mut();
        let mut report = FillReport::default();

        body.for_each_paragraph_mut(&mut |paragraph: &mut Paragraph| {
            self.fill_paragraph(paragraph, values, &mut ctx, &mut report);
        });

        info!(
            replaced = report.replaced,
            skipped = report.skipped.len(),
            "Template filled"
        );
        report
    }

    /// Fill the session's document and save it.
    ///
    /// The document is saved once, after every paragraph has been processed.
    /// If saving fails the error is returned and nothing partial is written.
    pub fn fill_session(
        &self,
        session: &mut dyn DocumentSession,
        values: &Substitutions,
    ) -> Result<FillReport> {
        let report = self.fill(session.document_mut(), values);
        session.save()?;
        self.observer.session_saved(&session.location());
        Ok(report)
    }

    fn fill_paragraph(
        &self,
        paragraph: &mut Paragraph,
        values: &Substitutions,
        ctx: &mut SpliceContext<'_>,
        report: &mut FillReport,
    ) {
        let stream = LogicalStream::flatten(paragraph);
        let matches = scan(&stream);
        if matches.is_empty() {
            return;
        }

        let mut edits = Vec::new();
        let mut planned: HashMap<NodeId, Vec<String>> = HashMap::new();

        for group in coalesce(&stream, &matches) {
            let Some(run_index) = paragraph.run_index_of_fragment(group.anchor) else {
                for tag in &group.matches {
                    self.skip(report, &tag.key, paragraph.id, SkipReason::MissingAnchor);
                }
                continue;
            };
            let anchor = paragraph.runs[run_index].properties.clone();

            let mut pieces = Vec::with_capacity(group.matches.len() * 2 + 1);
            let mut keys = Vec::with_capacity(group.matches.len());
            let mut cursor = 0;
            for tag in &group.matches {
                pieces.push(Piece::Literal(group.text[cursor..tag.start].to_string()));
                self.observer.match_found(&tag.key, paragraph.id);

                let built = match values.get(&tag.key) {
                    Some(value) => builder::build(&anchor, value),
                    None => Ok(builder::build_text(&anchor, "")),
                };
                match built {
                    Ok(unit) => {
                        pieces.push(Piece::Unit(unit));
                        keys.push(tag.key.clone());
                    }
                    Err(err) => {
                        pieces.push(Piece::Literal(group.text[tag.start..tag.end].to_string()));
                        let reason = SkipReason::UnsupportedValueKind(err.to_string());
                        self.skip(report, &tag.key, paragraph.id, reason);
                    }
                }
                cursor = tag.end;
            }
            pieces.push(Piece::Literal(group.text[cursor..].to_string()));

            edits.push(FragmentEdit::Replace {
                fragment: group.anchor,
                pieces,
            });
            edits.extend(
                group
                    .consumed
                    .iter()
                    .map(|&fragment| FragmentEdit::Remove { fragment }),
            );
            planned.insert(group.anchor, keys);
        }

        for anchor in apply_edits(paragraph, edits, ctx) {
            for key in planned.remove(&anchor).unwrap_or_default() {
                self.skip(report, &key, paragraph.id, SkipReason::MissingAnchor);
            }
        }
        report.replaced += planned.values().map(Vec::len).sum::<usize>();
    }

    fn skip(&self, report: &mut FillReport, key: &str, paragraph: NodeId, reason: SkipReason) {
        let skipped = SkippedMatch {
            key: key.to_string(),
            paragraph,
            reason,
        };
        self.observer.match_skipped(&skipped);
        report.skipped.push(skipped);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::sync::Arc;

    use image::{DynamicImage, ImageFormat, RgbImage};

    use super::*;
    use crate::builder::LengthUnit;
    use crate::model::{Extent, RunContent, RunProperties};
    use crate::session::MemorySession;

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<String>>,
    }

    impl FillObserver for Recorder {
        fn match_found(&self, key: &str, _paragraph: NodeId) {
            self.events.borrow_mut().push(format!("found {key}"));
        }

        fn match_skipped(&self, skipped: &SkippedMatch) {
            self.events.borrow_mut().push(format!("skipped {}", skipped.key));
        }

        fn session_saved(&self, location: &str) {
            self.events.borrow_mut().push(format!("saved {location}"));
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn single_paragraph(fragments: &[&str]) -> (Document, NodeId) {
        let mut doc = Document::new();
        let run = doc.new_run(Arc::default(), fragments);
        let id = doc.push_paragraph(vec![run]);
        (doc, id)
    }

    /// Each run rendered as its text, with breaks as `<br>`.
    fn run_texts(doc: &Document, id: NodeId) -> Vec<String> {
        doc.paragraph(id)
            .unwrap()
            .runs
            .iter()
            .map(|run| {
                run.content
                    .iter()
                    .map(|item| match item {
                        RunContent::Text(fragment) => fragment.text.clone(),
                        RunContent::Break => "<br>".to_string(),
                        RunContent::Drawing(_) => "<img>".to_string(),
                        RunContent::Opaque { .. } => "<opaque>".to_string(),
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn greeting_scenario() {
        let (mut doc, id) = single_paragraph(&["Hello {Name}, balance: {Bal}"]);
        let values: Substitutions = [("Name", "A\\nB"), ("Bal", "")].into_iter().collect();

        let report = TemplateEngine::with_observer(Recorder::default()).fill(&mut doc, &values);

        assert_eq!(report.replaced, 2);
        assert!(report.skipped.is_empty());
        assert_eq!(
            run_texts(&doc, id),
            vec!["Hello ", "A", "<br>", "B", ", balance: ", ""]
        );
        let text = doc.paragraph(id).unwrap().plain_text();
        assert!(!text.contains('{') && !text.contains('}'));
    }

    #[test]
    fn missing_key_becomes_empty_run() {
        let (mut doc, id) = single_paragraph(&["[{Unknown}]"]);
        let report = TemplateEngine::new().fill(&mut doc, &Substitutions::new());
        assert_eq!(report.replaced, 1);
        assert!(report.skipped.is_empty());
        assert_eq!(run_texts(&doc, id), vec!["[", "", "]"]);
    }

    #[test]
    fn inner_opening_brace_belongs_to_the_key() {
        let (mut doc, id) = single_paragraph(&["x {a {b} y"]);
        let values: Substitutions = [("a {b", "V")].into_iter().collect();

        let report = TemplateEngine::new().fill(&mut doc, &values);
        assert_eq!(report.replaced, 1);
        assert_eq!(doc.paragraph(id).unwrap().plain_text(), "x V y");
    }

    #[test]
    fn empty_braces_become_an_empty_run() {
        let (mut doc, id) = single_paragraph(&["fn() {} end"]);
        let report = TemplateEngine::new().fill(&mut doc, &Substitutions::new());
        assert_eq!(report.replaced, 1);
        assert_eq!(run_texts(&doc, id), vec!["fn() ", "", " end"]);
    }

    #[test]
    fn unterminated_tag_is_left_alone() {
        let (mut doc, id) = single_paragraph(&["Value: {Open"]);
        let before = doc.paragraph(id).unwrap().clone();
        let values: Substitutions = [("Open", "x")].into_iter().collect();

        let report = TemplateEngine::new().fill(&mut doc, &values);
        assert_eq!(report.matches(), 0);
        assert_eq!(doc.paragraph(id).unwrap(), &before);
    }

    #[test]
    fn split_tag_keeps_first_run_formatting() {
        let mut doc = Document::new();
        let plain = doc.new_run(Arc::default(), &["Total: {Am"]);
        let bold = doc.new_run(
            Arc::new(RunProperties {
                bold: true,
                ..RunProperties::default()
            }),
            &["ount} EUR"],
        );
        let id = doc.push_paragraph(vec![plain, bold]);
        let values: Substitutions = [("Amount", "12.50")].into_iter().collect();

        TemplateEngine::new().fill(&mut doc, &values);

        let paragraph = doc.paragraph(id).unwrap();
        assert_eq!(paragraph.plain_text(), "Total: 12.50 EUR");
        assert_eq!(run_texts(&doc, id), vec!["Total: ", "12.50", " EUR"]);
        assert!(paragraph.runs.iter().all(|run| !run.properties.bold));
    }

    #[test]
    fn image_tag_becomes_one_drawing() {
        let (mut doc, id) = single_paragraph(&["Photo: {Photo}."]);
        let mut values = Substitutions::new();
        values.insert_image(
            "Photo",
            ImagePayload::new(png(10, 10), 10.0, 10.0, LengthUnit::Pixels),
        );

        let report = TemplateEngine::new().fill(&mut doc, &values);
        assert_eq!(report.replaced, 1);

        let paragraph = doc.paragraph(id).unwrap();
        let drawings: Vec<_> = paragraph.drawings().collect();
        assert_eq!(drawings.len(), 1);
        assert_eq!(drawings[0].extent, Extent { cx: 95_250, cy: 95_250 });
        assert_eq!(doc.media.get(&drawings[0].media).unwrap().content_type, "image/png");
        assert_eq!(run_texts(&doc, id), vec!["Photo: ", "<img>", "."]);
    }

    #[test]
    fn unsupported_value_leaves_tag_and_reports() {
        let (mut doc, id) = single_paragraph(&["{Logo} and {Name}"]);
        let mut values = Substitutions::new();
        values.insert_image(
            "Logo",
            ImagePayload::new(b"garbage".to_vec(), 5.0, 5.0, LengthUnit::Millimeters),
        );
        values.insert_text("Name", "Ada");
        let engine = TemplateEngine::with_observer(Recorder::default());

        let report = engine.fill(&mut doc, &values);

        assert_eq!(report.replaced, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].key, "Logo");
        assert!(matches!(
            report.skipped[0].reason,
            SkipReason::UnsupportedValueKind(_)
        ));
        assert_eq!(doc.paragraph(id).unwrap().plain_text(), "{Logo} and Ada");
        assert!(doc.media.is_empty());
        assert_eq!(
            *engine.observer().events.borrow(),
            vec!["found Logo", "skipped Logo", "found Name"]
        );
    }

    #[test]
    fn values_are_not_rescanned() {
        let (mut doc, id) = single_paragraph(&["{A}"]);
        let values: Substitutions = [("A", "{B}"), ("B", "nested")].into_iter().collect();
        let engine = TemplateEngine::new();

        engine.fill(&mut doc, &values);
        assert_eq!(doc.paragraph(id).unwrap().plain_text(), "{B}");

        // A second pass does pick up the tag the first one introduced.
        engine.fill(&mut doc, &values);
        assert_eq!(doc.paragraph(id).unwrap().plain_text(), "nested");
    }

    #[test]
    fn fill_session_saves_once_and_notifies() {
        let (doc, _) = single_paragraph(&["{X}"]);
        let mut session = MemorySession::new(doc);
        let engine = TemplateEngine::with_observer(Recorder::default());
        let values: Substitutions = [("X", "y")].into_iter().collect();

        let report = engine.fill_session(&mut session, &values).unwrap();
        assert_eq!(report.replaced, 1);
        assert_eq!(session.saves(), 1);
        assert_eq!(
            engine.observer().events.borrow().last().map(String::as_str),
            Some("saved memory")
        );
    }
}
