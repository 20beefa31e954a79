// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docwerk-template — Tag substitution for word-processing templates.
//
// Finds `{key}` tags in paragraph text even when the editor has split them
// across runs, and replaces each with formatted text (multi-line values get
// line breaks) or an inline picture. Sessions own the document for the length
// of one fill and persist it atomically, either as a `.docx` package or as a
// JSON-serialized tree.

pub mod builder;
pub mod docx;
pub mod engine;
pub mod media;
pub mod model;
pub mod observer;
pub mod scanner;
pub mod session;
pub mod splice;
pub mod stream;

// Re-export the primary types so callers can use `docwerk_template::TemplateEngine` etc.
pub use builder::{ImagePayload, LengthUnit, SubstitutionValue};
pub use engine::{FillReport, SkipReason, SkippedMatch, Substitutions, TemplateEngine};
pub use media::{MediaId, MediaStore};
pub use model::{Document, NodeId, Paragraph, RunProperties};
pub use observer::{FillObserver, NullObserver, TracingObserver};
pub use docx::DocxSession;
pub use session::{DocumentSession, JsonFileSession, MemorySession, open_template};
