// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod classify;
pub mod reconcile;
pub mod regr;
pub mod register;
pub mod report;
pub mod task;

use anyhow::{Context, Result};
use std::env as std_env;

use crate::config::Config;
use crate::state::StateLock;

/// Take the state lock when configured; `None` means locking is off.
pub(crate) fn lock_state(config: &Config) -> Result<Option<StateLock>> {
    if !config.state_lock {
        return Ok(None);
    }
    let lock = StateLock::acquire(&config.state_file)
        .with_context(|| format!("failed to lock {}", config.state_file.display()))?;
    Ok(Some(lock))
}

/// Commands that reconcile or classify must run from the submission
/// directory; everything they touch is relative to it.
pub(crate) fn require_cwd_named(expected: &str) -> Result<()> {
    let cwd = std_env::current_dir().context("failed to resolve current directory")?;
    let name = cwd
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name != expected {
        anyhow::bail!(
            "current directory {} is not a {expected:?} directory",
            cwd.display()
        );
    }
    Ok(())
}

pub(crate) fn cwd_basename() -> Result<String> {
    let cwd = std_env::current_dir().context("failed to resolve current directory")?;
    Ok(cwd
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default())
}
