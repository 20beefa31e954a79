// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware location of the default configuration file.

use std::path::PathBuf;

const CONFIG_FILE: &str = "config.json";

/// Default configuration path: `$XDG_CONFIG_HOME/docwerk/config.json`,
/// falling back to `~/.config/docwerk/config.json`.
///
/// The file need not exist; a missing file means default settings.
pub fn default_config_path() -> PathBuf {
    config_base().join("docwerk").join(CONFIG_FILE)
}

fn config_base() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME")
        && !xdg.is_empty()
    {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config");
    }
    // Last resort: the working directory
    PathBuf::from(".")
}
