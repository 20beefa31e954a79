// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tag scanner — locates `{key}` placeholders in a paragraph's logical stream.
//
// The scanner only sees the concatenated text, so a tag whose braces live in
// different fragments (or different runs) is found exactly like an intact
// one. Non-text content between fragments ends any tag that is still open.

use tracing::trace;

use crate::stream::LogicalStream;

/// Opening tag delimiter.
pub const OPEN_DELIMITER: char = '{';
/// Closing tag delimiter.
pub const CLOSE_DELIMITER: char = '}';

/// One `{key}` occurrence, as byte offsets into the scanned text.
///
/// `start` points at the opening brace and `end` just past the closing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch {
    pub start: usize,
    pub end: usize,
    pub key: String,
}

#[derive(Debug, Clone, Copy)]
enum ScanState {
    Idle,
    /// An opening brace was seen at this offset and no closing one yet.
    Accumulating { open: usize },
}

/// Find every tag in `stream`, left to right, without overlaps.
///
/// The key runs up to the first closing brace, so `{a {b}` has key `a {b`
/// and `{}` has the empty key. An opening brace with no closing brace before
/// the end of the paragraph, or before a break or drawing, is not a tag and
/// stays literal text.
pub fn scan(stream: &LogicalStream) -> Vec<TagMatch> {
    let text = stream.text();
    let barriers = stream.barriers();
    let mut next_barrier = 0;
    let mut state = ScanState::Idle;
    let mut matches = Vec::new();

    for (index, ch) in text.char_indices() {
        while next_barrier < barriers.len() && barriers[next_barrier] <= index {
            if let ScanState::Accumulating { open } = state
                && barriers[next_barrier] > open
            {
                trace!(open, barrier = barriers[next_barrier], "Open tag interrupted");
                state = ScanState::Idle;
            }
            next_barrier += 1;
        }

        match (ch, state) {
            (OPEN_DELIMITER, ScanState::Idle) => state = ScanState::Accumulating { open: index },
            (CLOSE_DELIMITER, ScanState::Accumulating { open }) => {
                let key = &text[open + OPEN_DELIMITER.len_utf8()..index];
                matches.push(TagMatch {
                    start: open,
                    end: index + CLOSE_DELIMITER.len_utf8(),
                    key: key.to_string(),
                });
                state = ScanState::Idle;
            }
            _ => {}
        }
    }

    if let ScanState::Accumulating { open } = state {
        trace!(open, "Unterminated tag left as text");
    }

    matches
}
