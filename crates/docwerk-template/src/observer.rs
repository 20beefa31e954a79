// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fill observers — checkpoints the engine reports to while it works.

use tracing::{debug, info, warn};

use crate::engine::SkippedMatch;
use crate::model::NodeId;

/// Receives the engine's checkpoints. Every method defaults to a no-op.
pub trait FillObserver {
    fn match_found(&self, _key: &str, _paragraph: NodeId) {}

    fn match_skipped(&self, _skipped: &SkippedMatch) {}

    fn session_saved(&self, _location: &str) {}
}

/// Forwards checkpoints to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl FillObserver for TracingObserver {
    fn match_found(&self, key: &str, paragraph: NodeId) {
        debug!(key, %paragraph, "Tag found");
    }

    fn match_skipped(&self, skipped: &SkippedMatch) {
        warn!(
            key = %skipped.key,
            paragraph = %skipped.paragraph,
            reason = %skipped.reason,
            "Tag skipped"
        );
    }

    fn session_saved(&self, location: &str) {
        info!(location, "Document saved");
    }
}

/// Discards every checkpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl FillObserver for NullObserver {}
