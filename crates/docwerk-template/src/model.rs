// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document content tree: body -> blocks -> paragraphs -> runs -> fragments.
//
// Every node that the engine may need to find again after a read-only pass
// carries a `NodeId`, unique within its document. Formatting is held as an
// `Arc<RunProperties>` so that copying it onto a synthesised run is a
// reference-count increment rather than a deep clone.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::media::{MediaId, MediaStore};

/// Stable identity of a node within one document.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out fresh `NodeId`s for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn next_id(&mut self) -> NodeId {
        self.next += 1;
        NodeId(self.next)
    }

    /// Make sure no id up to and including `id` is handed out again.
    fn reserve_through(&mut self, id: NodeId) {
        self.next = self.next.max(id.0);
    }
}

// -- Formatting ---------------------------------------------------------------

/// An sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };

    /// `RRGGBB` hex form as used by word-processing markup.
    pub fn to_hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Character formatting shared by every fragment of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunProperties {
    pub font: Option<String>,
    /// Font size in half-points.
    pub size_half_points: Option<u32>,
    pub color: Option<Color>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub highlight: Option<String>,
    /// Markup of formatting elements not modelled above, carried through
    /// unchanged when the document is written back.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<String>,
}

impl RunProperties {
    /// Copy of these properties with the colour replaced.
    pub fn with_color(&self, color: Color) -> Self {
        Self {
            color: Some(color),
            ..self.clone()
        }
    }
}

// -- Inline content -----------------------------------------------------------

/// Smallest unit of text storage; always owned by exactly one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub id: NodeId,
    pub text: String,
}

/// Size of a graphic in English Metric Units (914400 per inch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub cx: i64,
    pub cy: i64,
}

/// Distance between a graphic and the surrounding text, in EMU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distance {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

/// How a graphic sits in the text flow. Only inline placement is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    #[default]
    Inline,
}

/// A picture anchored inside a run, referencing bytes in the media store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    pub id: NodeId,
    pub media: MediaId,
    pub extent: Extent,
    #[serde(default)]
    pub distance: Distance,
    #[serde(default)]
    pub placement: Placement,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunContent {
    Text(TextFragment),
    /// Forced line break.
    Break,
    Drawing(Drawing),
    /// Markup carried through verbatim: tabs, field codes, bookmarks,
    /// pictures already in the template. `standalone` markup sits directly
    /// in the paragraph rather than inside a run.
    Opaque {
        xml: String,
        #[serde(default)]
        standalone: bool,
    },
}

/// A span of content sharing one set of formatting properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: NodeId,
    #[serde(default)]
    pub properties: Arc<RunProperties>,
    pub content: Vec<RunContent>,
}

impl Run {
    /// Whether this run holds the fragment `id`.
    pub fn contains_fragment(&self, id: NodeId) -> bool {
        self.content
            .iter()
            .any(|item| matches!(item, RunContent::Text(fragment) if fragment.id == id))
    }

    /// Concatenated text of the run's fragments, ignoring breaks and drawings.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|item| match item {
                RunContent::Text(fragment) => Some(fragment.text.as_str()),
                _ => None,
            })
            .collect()
    }
}

// -- Blocks -------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub id: NodeId,
    pub runs: Vec<Run>,
}

impl Paragraph {
    /// Visible text with breaks rendered as `\n` and drawings as U+FFFC.
    /// Opaque markup contributes nothing.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for item in self.runs.iter().flat_map(|run| run.content.iter()) {
            match item {
                RunContent::Text(fragment) => out.push_str(&fragment.text),
                RunContent::Break => out.push('\n'),
                RunContent::Drawing(_) => out.push('\u{FFFC}'),
                RunContent::Opaque { .. } => {}
            }
        }
        out
    }

    /// Index of the run holding fragment `id`.
    pub fn run_index_of_fragment(&self, id: NodeId) -> Option<usize> {
        self.runs.iter().position(|run| run.contains_fragment(id))
    }

    /// Every drawing in the paragraph, in order.
    pub fn drawings(&self) -> impl Iterator<Item = &Drawing> {
        self.runs
            .iter()
            .flat_map(|run| run.content.iter())
            .filter_map(|item| match item {
                RunContent::Drawing(drawing) => Some(drawing),
                _ => None,
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    /// Block content the engine carries through untouched (section breaks,
    /// content controls, ...).
    Opaque { kind: String },
}

/// Ordered sequence of top-level blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub blocks: Vec<Block>,
}

impl Body {
    /// Visit every paragraph in document order, descending into tables.
    pub fn for_each_paragraph_mut(&mut self, f: &mut dyn FnMut(&mut Paragraph)) {
        visit_blocks_mut(&mut self.blocks, f);
    }

    /// Every paragraph in document order, descending into tables.
    pub fn paragraphs(&self) -> Vec<&Paragraph> {
        let mut out = Vec::new();
        collect_paragraphs(&self.blocks, &mut out);
        out
    }

    fn max_node_id(&self) -> NodeId {
        let mut max = NodeId(0);
        for paragraph in self.paragraphs() {
            max = max.max(paragraph.id);
            for run in &paragraph.runs {
                max = max.max(run.id);
                for item in &run.content {
                    match item {
                        RunContent::Text(fragment) => max = max.max(fragment.id),
                        RunContent::Drawing(drawing) => max = max.max(drawing.id),
                        RunContent::Break | RunContent::Opaque { .. } => {}
                    }
                }
            }
        }
        max
    }
}

fn visit_blocks_mut(blocks: &mut [Block], f: &mut dyn FnMut(&mut Paragraph)) {
    for block in blocks {
        match block {
            Block::Paragraph(paragraph) => f(paragraph),
            Block::Table(table) => {
                for cell in table.rows.iter_mut().flat_map(|row| row.cells.iter_mut()) {
                    visit_blocks_mut(&mut cell.blocks, f);
                }
            }
            Block::Opaque { .. } => {}
        }
    }
}

fn collect_paragraphs<'a>(blocks: &'a [Block], out: &mut Vec<&'a Paragraph>) {
    for block in blocks {
        match block {
            Block::Paragraph(paragraph) => out.push(paragraph),
            Block::Table(table) => {
                for cell in table.rows.iter().flat_map(|row| row.cells.iter()) {
                    collect_paragraphs(&cell.blocks, out);
                }
            }
            Block::Opaque { .. } => {}
        }
    }
}

// -- Document -----------------------------------------------------------------

/// A word-processing document: content tree plus its media parts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub body: Body,
    #[serde(default)]
    pub media: MediaStore,
    #[serde(default)]
    ids: IdAllocator,
}

/// Mutable access to the id allocator and media store while the body is
/// borrowed separately.
pub struct SpliceContext<'a> {
    pub ids: &'a mut IdAllocator,
    pub media: &'a mut MediaStore,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document serialized as JSON.
    ///
    /// The id allocator is advanced past every id found in the tree, so
    /// hand-written templates need not track it.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut document: Document = serde_json::from_str(json)?;
        let max = document.body.max_node_id();
        document.ids.reserve_through(max);
        Ok(document)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn next_id(&mut self) -> NodeId {
        self.ids.next_id()
    }

    /// Split the document into its body and a splice context.
    pub fn split_mut(&mut self) -> (&mut Body, SpliceContext<'_>) {
        (
            &mut self.body,
            SpliceContext {
                ids: &mut self.ids,
                media: &mut self.media,
            },
        )
    }

    // -- Construction helpers --

    /// A run holding one text fragment per entry of `fragments`.
    pub fn new_run(&mut self, properties: Arc<RunProperties>, fragments: &[&str]) -> Run {
        let id = self.next_id();
        let content = fragments
            .iter()
            .map(|text| {
                RunContent::Text(TextFragment {
                    id: self.next_id(),
                    text: (*text).to_string(),
                })
            })
            .collect();
        Run {
            id,
            properties,
            content,
        }
    }

    /// Append a paragraph made of `runs` to the body and return its id.
    pub fn push_paragraph(&mut self, runs: Vec<Run>) -> NodeId {
        let id = self.next_id();
        self.body.blocks.push(Block::Paragraph(Paragraph { id, runs }));
        id
    }

    /// Find a paragraph anywhere in the body.
    pub fn paragraph(&self, id: NodeId) -> Option<&Paragraph> {
        self.body.paragraphs().into_iter().find(|p| p.id == id)
    }
}
