// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! On-disk regression document.
//!
//! The document is a single JSON file, rewritten whole on every change.
//! Writes go through a temp file and rename so a crash never leaves a
//! half-written document, and a sibling `.lock` file serializes writers
//! across processes.

pub mod entry;

use std::fs;
use std::io::{self, ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub use entry::{CheckResult, RegrEntry, SimEntry, SimStatus, TaskEntry, TriState};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("i/o error on state file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode state document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("state file is locked by another process (lock file {0})")]
    Locked(PathBuf),
    #[error("state file has no regressions")]
    Empty,
}

/// The whole tracked state: every known regression with its tasks and sims.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegrDoc {
    #[serde(default)]
    pub regrs: Vec<RegrEntry>,
}

impl RegrDoc {
    /// Load the document from `path`. A missing, empty, or unparseable
    /// file yields an empty document; only hard i/o errors propagate.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        match serde_json::from_str(&raw) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "state file unreadable, starting fresh");
                Ok(Self::default())
            }
        }
    }

    /// Persist the document. Content lands in `<path>.tmp` first and is
    /// renamed into place, so readers always see a complete document.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(self)?;
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(body.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Append a regression unless one with the same id already exists.
    pub fn add_regr(&mut self, regr: RegrEntry) -> bool {
        if self.regrs.iter().any(|r| r.regr_id == regr.regr_id) {
            return false;
        }
        self.regrs.push(regr);
        true
    }

    /// The most recently appended regression; commands that follow a
    /// registration act on this one.
    pub fn last_regr_mut(&mut self) -> Result<&mut RegrEntry, StateError> {
        self.regrs.last_mut().ok_or(StateError::Empty)
    }

    pub fn remove_regr(&mut self, regr_id: i64) -> bool {
        let before = self.regrs.len();
        self.regrs.retain(|r| r.regr_id != regr_id);
        self.regrs.len() != before
    }
}

/// Load the per-node task document. Missing or unreadable files yield
/// `None`; the caller starts a fresh task entry.
pub fn load_task(path: &Path) -> Result<Option<TaskEntry>, StateError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str(&raw) {
        Ok(task) => Ok(Some(task)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "task file unreadable, starting fresh");
            Ok(None)
        }
    }
}

/// Persist the per-node task document with the same temp-then-rename
/// discipline as the main document.
pub fn save_task(path: &Path, task: &TaskEntry) -> Result<(), StateError> {
    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_string_pretty(task)?;
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(body.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Advisory cross-process lock guarding the state file. Created with
/// O_EXCL; held until dropped. Acquisition retries briefly so two
/// commands racing on the same directory queue up instead of failing.
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    const RETRIES: u32 = 50;
    const RETRY_DELAY: Duration = Duration::from_millis(100);

    pub fn acquire(state_path: &Path) -> Result<Self, StateError> {
        let path = lock_path(state_path);
        for attempt in 0..Self::RETRIES {
            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if attempt == 0 {
                        warn!(path = %path.display(), "waiting for state lock");
                    }
                    std::thread::sleep(Self::RETRY_DELAY);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StateError::Locked(path))
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove state lock");
            }
        }
    }
}

fn lock_path(state_path: &Path) -> PathBuf {
    let mut name = state_path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    state_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Invocation;
    use tempfile::tempdir;

    fn doc_with_regr(regr_id: i64) -> RegrDoc {
        let mut doc = RegrDoc::default();
        doc.add_regr(RegrEntry::new(regr_id, "slurm", "uart", None, &Invocation::capture()));
        doc
    }

    #[test]
    fn load_missing_file_yields_empty_doc() {
        let dir = tempdir().unwrap();
        let doc = RegrDoc::load(&dir.path().join("absent.json")).unwrap();
        assert!(doc.regrs.is_empty());
    }

    #[test]
    fn load_corrupt_file_yields_empty_doc() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{\"regrs\": [truncated").unwrap();
        let doc = RegrDoc::load(&path).unwrap();
        assert!(doc.regrs.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let doc = doc_with_regr(3);
        doc.save(&path).unwrap();
        let loaded = RegrDoc::load(&path).unwrap();
        assert_eq!(loaded.regrs.len(), 1);
        assert_eq!(loaded.regrs[0].regr_id, 3);
        assert_eq!(loaded.regrs[0].module_name, "uart");
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        doc_with_regr(1).save(&path).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn add_regr_is_idempotent_by_id() {
        let mut doc = doc_with_regr(5);
        let dup = RegrEntry::new(5, "slurm", "other", None, &Invocation::capture());
        assert!(!doc.add_regr(dup));
        assert_eq!(doc.regrs.len(), 1);
        assert_eq!(doc.regrs[0].module_name, "uart");
    }

    #[test]
    fn remove_regr_reports_presence() {
        let mut doc = doc_with_regr(2);
        assert!(doc.remove_regr(2));
        assert!(!doc.remove_regr(2));
        assert!(doc.regrs.is_empty());
    }

    #[test]
    fn task_document_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vcm_task_info.json");
        assert!(load_task(&path).unwrap().is_none());

        let mut task = TaskEntry::default();
        task.task_id = Some(42);
        task.corner_name = Some("ff_max".to_string());
        save_task(&path, &task).unwrap();

        let loaded = load_task(&path).unwrap().unwrap();
        assert_eq!(loaded.task_id, Some(42));
        assert_eq!(loaded.corner_name.as_deref(), Some("ff_max"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn lock_blocks_second_acquirer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let lock = StateLock::acquire(&path).unwrap();
        let lock_file = dir.path().join("state.json.lock");
        assert!(lock_file.exists());
        // Holder still alive: a raw create_new on the same path must fail.
        let second = fs::OpenOptions::new().write(true).create_new(true).open(&lock_file);
        assert!(second.is_err());
        drop(lock);
        assert!(!lock_file.exists());
    }

    #[test]
    fn lock_released_on_drop_allows_reacquire() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        drop(StateLock::acquire(&path).unwrap());
        let again = StateLock::acquire(&path).unwrap();
        drop(again);
    }

    #[test]
    fn document_with_extra_fields_still_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"regrs": [], "schema_hint": "future"}"#,
        )
        .unwrap();
        let doc = RegrDoc::load(&path).unwrap();
        assert!(doc.regrs.is_empty());
    }
}
