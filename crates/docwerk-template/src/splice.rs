// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tree splicer — replaces an anchor run by the runs that render its
// replaced fragments, keeping every other piece of content in place.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::builder::{ReplacementNode, ReplacementUnit};
use crate::model::{
    Distance, Drawing, NodeId, Placement, Run, RunContent, RunProperties, SpliceContext,
    TextFragment,
};

/// What a replaced fragment turns into, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Piece {
    /// Text outside any tag; keeps the anchor run's own formatting.
    Literal(String),
    /// The nodes standing in for one tag.
    Unit(ReplacementUnit),
}

/// Split `run` around every fragment listed in `replacements`.
///
/// Content before, between and after the replaced fragments stays in runs
/// with the original formatting, in its original order. Each replaced
/// fragment expands to its pieces. The original run itself is dropped.
/// Consumed entries are removed from `replacements`.
pub fn splice_run(
    run: Run,
    replacements: &mut HashMap<NodeId, Vec<Piece>>,
    ctx: &mut SpliceContext<'_>,
) -> Vec<Run> {
    let Run {
        id: anchor_id,
        properties,
        content,
    } = run;
    let mut out = Vec::new();
    let mut pending = Vec::new();

    for item in content {
        let pieces = match &item {
            RunContent::Text(fragment) => replacements.remove(&fragment.id),
            _ => None,
        };
        let Some(pieces) = pieces else {
            pending.push(item);
            continue;
        };

        flush(&mut out, &mut pending, &properties, ctx);
        for piece in pieces {
            match piece {
                Piece::Literal(text) if text.is_empty() => {}
                Piece::Literal(text) => out.push(text_run(Arc::clone(&properties), text, ctx)),
                Piece::Unit(unit) => out.extend(materialize(unit, ctx)),
            }
        }
    }
    flush(&mut out, &mut pending, &properties, ctx);

    trace!(anchor = %anchor_id, runs = out.len(), "Run spliced");
    out
}

/// Turn a replacement unit into runs, registering graphic media.
pub fn materialize(unit: ReplacementUnit, ctx: &mut SpliceContext<'_>) -> Vec<Run> {
    unit.nodes
        .into_iter()
        .map(|node| match node {
            ReplacementNode::Text { properties, text } => text_run(properties, text, ctx),
            ReplacementNode::Break { properties } => Run {
                id: ctx.ids.next_id(),
                properties,
                content: vec![RunContent::Break],
            },
            ReplacementNode::Graphic {
                properties,
                request,
                extent,
                name,
            } => {
                let media = ctx.media.register(&request);
                Run {
                    id: ctx.ids.next_id(),
                    properties,
                    content: vec![RunContent::Drawing(Drawing {
                        id: ctx.ids.next_id(),
                        media,
                        extent,
                        distance: Distance::default(),
                        placement: Placement::Inline,
                        name,
                    })],
                }
            }
        })
        .collect()
}

fn text_run(properties: Arc<RunProperties>, text: String, ctx: &mut SpliceContext<'_>) -> Run {
    Run {
        id: ctx.ids.next_id(),
        properties,
        content: vec![RunContent::Text(TextFragment {
            id: ctx.ids.next_id(),
            text,
        })],
    }
}

/// Move untouched content collected so far into its own run.
fn flush(
    out: &mut Vec<Run>,
    pending: &mut Vec<RunContent>,
    properties: &Arc<RunProperties>,
    ctx: &mut SpliceContext<'_>,
) {
    if pending.is_empty() {
        return;
    }
    out.push(Run {
        id: ctx.ids.next_id(),
        properties: Arc::clone(properties),
        content: std::mem::take(pending),
    });
}
