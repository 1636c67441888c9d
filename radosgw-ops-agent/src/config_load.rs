// Copyright 2026-Present the radosgw-ops-exporter Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use anyhow::{Context, Result};
use radosgw_ops_core::Config;

/// Loads a [`Config`] from a TOML file, or returns default configuration values when
/// no path is given. This is deliberately a single-source loader, not a
/// layered file/env/flags merge — the Open Question in DESIGN.md resolves
/// "what counts as configuration" in favor of the simplest thing that lets
/// every field in §6 be set from one file.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => Config::default(),
    };
    config.apply_shortcuts();
    Ok(config)
}
