// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer — bridges the command line to the docwerk backend crates.
//
// Each operation wraps one or more backend crate APIs and reports back a
// `ServiceOutcome` the front end can print directly.

pub mod data_dir;
pub mod document_service;
pub mod qr;
pub mod substitution_data;
