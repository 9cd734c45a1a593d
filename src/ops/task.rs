// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Compile-context registration. `add` runs in a node's work directory
//! after compilation; `attach` runs in the submission directory and links
//! each node's task to the regression.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::check;
use crate::config::Config;
use crate::db::{NewTask, RegrStore};
use crate::env::{self, STAMP_LAYOUT};
use crate::state::{self, RegrDoc, TriState};

const COMP_LOG: &str = "comp.log";
const COMP_FAIL_MARKER: &str = "vcm.comp.fail";

/// Register the current directory's compile as a task. Skips silently
/// when the compile log fingerprint has not changed since the last run.
pub async fn add(
    store: &RegrStore,
    config: &Config,
    project: &str,
    module: &str,
    git_de: &str,
    git_dv: &str,
) -> Result<()> {
    // A fresh run invalidates any previous failure marker.
    let _ = fs::remove_file(COMP_FAIL_MARKER);

    let dir_name = super::cwd_basename()?;
    if !(dir_name.starts_with("sim_pre")
        || dir_name.starts_with("sim_post")
        || dir_name.starts_with("regr"))
    {
        anyhow::bail!("current directory {dir_name:?} is not a sim_pre / sim_post / regr directory");
    }

    let comp_log = Path::new(COMP_LOG);
    if !comp_log.is_file() {
        anyhow::bail!("no {COMP_LOG} here; compile before registering a task");
    }
    if !check::comp_result_ok(comp_log) {
        fs::write(
            COMP_FAIL_MARKER,
            "compilation did not reach elaboration; see comp.log\n",
        )
        .context("failed to write failure marker")?;
        anyhow::bail!("{COMP_LOG} does not show a finished elaboration");
    }

    let user = env::current_user();
    let host = env::current_host();
    let mtime = comp_log_mtime(comp_log)?;

    let mut task = state::load_task(&config.task_file)?.unwrap_or_default();
    task.status_regr = if dir_name.starts_with("regr") {
        TriState::True
    } else {
        TriState::False
    };
    task.status_check = TriState::True;

    let unchanged = task.comp_log_time.as_deref() == Some(mtime.as_str())
        && task.current_user == user
        && task.current_host == host;
    if unchanged && task.task_id.is_some() {
        info!("compile log unchanged, task already registered, skipping");
        return Ok(());
    }

    let project_id = store.require_project_id(project).await?;
    let module_id = store.require_module_id(project_id, module).await?;
    let task_id = store
        .add_task(&NewTask {
            module_id,
            git_de: git_de.to_string(),
            git_dv: git_dv.to_string(),
            created_by: user.clone(),
            created_host: host.clone(),
        })
        .await?;

    task.task_id = Some(task_id);
    task.git_de = git_de.to_string();
    task.git_dv = git_dv.to_string();
    // A new compile invalidates whatever sims the old binary produced.
    task.clear_sims();

    let corner = check::find_corner(comp_log);
    task.status_post = if corner.is_some() {
        TriState::True
    } else {
        TriState::False
    };
    task.corner_name = corner.clone();
    store
        .update_task_post(
            task_id,
            task.status_post.as_str(),
            &mtime,
            corner.as_deref(),
        )
        .await?;

    task.comp_log_time = Some(mtime);
    task.current_user = user;
    task.current_host = host;
    state::save_task(&config.task_file, &task)?;

    info!(task_id, corner = ?task.corner_name, "task registered");
    println!("registered task {task_id}");
    Ok(())
}

/// Link every participating node's task to the latest regression: walks
/// each node's work area, loads its task document, updates the store row
/// and replaces the regression's task list.
pub async fn attach(config: &Config, store: &RegrStore) -> Result<()> {
    super::require_cwd_named(&config.regr_dir_name)?;

    let _lock = super::lock_state(config)?;
    let mut doc = RegrDoc::load(&config.state_file)?;
    let regr = doc.last_regr_mut()?;
    let regr_id = regr.regr_id;

    let part_name = regr.part_name.clone().context("regression has no part_name; run set-slurm first")?;
    let part_mode = regr.part_mode.clone().context("regression has no part_mode; run set-slurm first")?;
    let node_name = regr.node_name.clone().unwrap_or_default();
    let work_name = regr.work_name.clone().context("regression has no work_name; run set-slurm first")?;
    let user = regr.current_user.clone();

    let nodes = config.nodes_for(&part_name, &part_mode, &node_name)?;
    regr.clear_tasks();

    let task_file_name = config
        .task_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "vcm_task_info.json".to_string());

    for node in &nodes {
        let path = node_task_file(&node.host_dir, &user, &work_name, &task_file_name);
        if !path.is_file() {
            anyhow::bail!("task file {} not found; register a task on {} first", path.display(), node.node_name);
        }
        let mut task = state::load_task(&path)?
            .with_context(|| format!("task file {} is unreadable", path.display()))?;
        let task_id = task
            .task_id
            .with_context(|| format!("task file {} carries no task id", path.display()))?;

        store.update_task_regr(task_id, TriState::True.as_str(), regr_id).await?;
        task.status_regr = TriState::True;
        if !regr.add_task(task) {
            warn!(task_id, node = %node.node_name, "duplicate task id across nodes, kept the first");
        }
        info!(task_id, node = %node.node_name, regr_id, "task attached");
    }

    doc.save(&config.state_file)?;
    println!("attached {} task(s) to regression {regr_id}", nodes.len());
    Ok(())
}

fn comp_log_mtime(path: &Path) -> Result<String> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("failed to stat {}", path.display()))?;
    let stamp = OffsetDateTime::from(modified)
        .format(STAMP_LAYOUT)
        .context("failed to format compile log mtime")?;
    Ok(stamp)
}

fn node_task_file(host_dir: &str, user: &str, work_name: &str, task_file_name: &str) -> PathBuf {
    PathBuf::from("/")
        .join(host_dir)
        .join("work")
        .join(user)
        .join(work_name)
        .join("regr")
        .join(task_file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_task_file_composes_nfs_path() {
        let path = node_task_file("home_d2", "verifier", "uart_nightly", "vcm_task_info.json");
        assert_eq!(
            path,
            PathBuf::from("/home_d2/work/verifier/uart_nightly/regr/vcm_task_info.json")
        );
    }
}
