// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fragment coalescer — the logical text view of one paragraph, and the only
// code path that merges or removes text fragments.
//
// Editing happens in two phases. `flatten` takes a read-only snapshot of the
// paragraph's text with fragment provenance; `coalesce` plans which fragments
// must be merged so that every tag lives in exactly one fragment; and
// `apply_edits` commits the plan keyed by fragment id. Nothing is mutated
// while the snapshot is still being read.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::model::{NodeId, Paragraph, RunContent, SpliceContext};
use crate::scanner::TagMatch;
use crate::splice::{Piece, splice_run};

/// Where one fragment's text sits inside the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub fragment: NodeId,
    pub run: NodeId,
    pub start: usize,
    pub end: usize,
}

/// Concatenated text of a paragraph with a back-pointer for every byte.
#[derive(Debug, Clone, Default)]
pub struct LogicalStream {
    paragraph: NodeId,
    text: String,
    segments: Vec<Segment>,
    barriers: Vec<usize>,
}

impl LogicalStream {
    /// Snapshot the text fragments of `paragraph` in document order.
    ///
    /// Breaks, drawings and opaque markup contribute no text; their offsets
    /// are recorded as barriers that no tag may span.
    pub fn flatten(paragraph: &Paragraph) -> Self {
        let mut stream = Self {
            paragraph: paragraph.id,
            ..Self::default()
        };

        for run in &paragraph.runs {
            for item in &run.content {
                match item {
                    RunContent::Text(fragment) => {
                        let start = stream.text.len();
                        stream.text.push_str(&fragment.text);
                        stream.segments.push(Segment {
                            fragment: fragment.id,
                            run: run.id,
                            start,
                            end: stream.text.len(),
                        });
                    }
                    RunContent::Break | RunContent::Drawing(_) | RunContent::Opaque { .. } => {
                        let offset = stream.text.len();
                        if stream.barriers.last() != Some(&offset) {
                            stream.barriers.push(offset);
                        }
                    }
                }
            }
        }

        stream
    }

    pub fn paragraph(&self) -> NodeId {
        self.paragraph
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Offsets of non-text content, ascending and deduplicated.
    pub fn barriers(&self) -> &[usize] {
        &self.barriers
    }
}

/// A group of adjacent fragments merged so that its tags sit in one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoalescedFragment {
    /// First fragment of the group; it receives the merged text.
    pub anchor: NodeId,
    /// Run holding the anchor when the stream was taken.
    pub run: NodeId,
    /// Concatenated text of every fragment in the group.
    pub text: String,
    /// The other fragments of the group, to be removed.
    pub consumed: Vec<NodeId>,
    /// Tags inside `text`, offsets relative to `text`.
    pub matches: Vec<TagMatch>,
}

/// Plan the merge pre-pass for `matches` (as returned by the scanner).
///
/// Fragments touched by the same tag are merged into the first of them. When
/// tags chain across fragments (`{A` `}{B` `}`) the whole chain becomes one
/// group. Fragments touched by no tag are left alone.
pub fn coalesce(stream: &LogicalStream, matches: &[TagMatch]) -> Vec<CoalescedFragment> {
    let segments = stream.segments();
    let mut groups: Vec<(usize, usize, Vec<&TagMatch>)> = Vec::new();

    for tag in matches {
        let first = segments.partition_point(|s| s.end <= tag.start);
        let last = segments.partition_point(|s| s.start < tag.end).saturating_sub(1);
        if first >= segments.len() || last < first {
            warn!(key = %tag.key, start = tag.start, "Tag outside of stream, ignored");
            continue;
        }

        match groups.last_mut() {
            Some((_, group_last, tags)) if first <= *group_last => {
                *group_last = (*group_last).max(last);
                tags.push(tag);
            }
            _ => groups.push((first, last, vec![tag])),
        }
    }

    groups
        .into_iter()
        .map(|(first, last, tags)| {
            let base = segments[first].start;
            let coalesced = CoalescedFragment {
                anchor: segments[first].fragment,
                run: segments[first].run,
                text: stream.text()[base..segments[last].end].to_string(),
                consumed: segments[first + 1..=last].iter().map(|s| s.fragment).collect(),
                matches: tags
                    .into_iter()
                    .map(|tag| TagMatch {
                        start: tag.start - base,
                        end: tag.end - base,
                        key: tag.key.clone(),
                    })
                    .collect(),
            };
            if !coalesced.consumed.is_empty() {
                debug!(
                    anchor = %coalesced.anchor,
                    consumed = coalesced.consumed.len(),
                    "Merging split tag fragments"
                );
            }
            coalesced
        })
        .collect()
}

/// A planned change to one fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentEdit {
    /// Replace the fragment with literal text and replacement units, in order.
    Replace { fragment: NodeId, pieces: Vec<Piece> },
    /// Drop the fragment; its text has been merged elsewhere.
    Remove { fragment: NodeId },
}

/// Commit `edits` to `paragraph`.
///
/// Replacements are applied before removals, so a fragment consumed by a
/// merge can live in the anchor's own run. A run left empty by a removal is
/// pruned. Returns the fragments of replacements that could not be found in
/// the paragraph; those edits are skipped and the rest still apply. Callers
/// must not submit the removals belonging to a replacement they already know
/// to be unresolvable.
pub fn apply_edits(
    paragraph: &mut Paragraph,
    edits: Vec<FragmentEdit>,
    ctx: &mut SpliceContext<'_>,
) -> Vec<NodeId> {
    let mut replacements: HashMap<NodeId, Vec<Piece>> = HashMap::new();
    let mut removals = Vec::new();
    for edit in edits {
        match edit {
            FragmentEdit::Replace { fragment, pieces } => {
                replacements.insert(fragment, pieces);
            }
            FragmentEdit::Remove { fragment } => removals.push(fragment),
        }
    }

    let mut unresolved: Vec<NodeId> = replacements
        .keys()
        .filter(|id| paragraph.run_index_of_fragment(**id).is_none())
        .copied()
        .collect();
    unresolved.sort();
    for id in &unresolved {
        warn!(fragment = %id, paragraph = %paragraph.id, "Anchor fragment has no run");
        replacements.remove(id);
    }

    if !replacements.is_empty() {
        let runs = std::mem::take(&mut paragraph.runs);
        for run in runs {
            let touched = run.content.iter().any(|item| {
                matches!(item, RunContent::Text(fragment) if replacements.contains_key(&fragment.id))
            });
            if touched {
                paragraph.runs.extend(splice_run(run, &mut replacements, ctx));
            } else {
                paragraph.runs.push(run);
            }
        }
    }

    for id in removals {
        let Some(index) = paragraph.run_index_of_fragment(id) else {
            debug!(fragment = %id, "Fragment already gone");
            continue;
        };
        let run = &mut paragraph.runs[index];
        run.content
            .retain(|item| !matches!(item, RunContent::Text(fragment) if fragment.id == id));
        if run.content.is_empty() {
            paragraph.runs.remove(index);
        }
    }

    unresolved
}
