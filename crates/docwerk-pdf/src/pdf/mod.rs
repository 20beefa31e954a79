// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — merging, barcode stamping, and image page creation.

pub mod merge;
pub mod stamp;
pub mod writer;

pub use merge::PdfMerger;
pub use stamp::PdfStamper;
pub use writer::ImagePdfWriter;

use lopdf::{Dictionary, Document, Object};

/// Page tree depth after which inheritance lookups give up.
const MAX_TREE_DEPTH: usize = 32;

/// Look up an inheritable page attribute (`/Resources`, `/MediaBox`, ...),
/// walking up the `/Parent` chain when the page does not set it itself.
pub(crate) fn inherited_attribute<'a>(
    document: &'a Document,
    page: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    if let Ok(value) = page.get(key) {
        return Some(value);
    }

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let node = document.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}
