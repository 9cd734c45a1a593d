// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Regression lifecycle: create, bind submission details, list, delete.

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::db::{NewRegr, RegrStore};
use crate::env::Invocation;
use crate::format;
use crate::state::{RegrDoc, RegrEntry};

/// Create a regression: one store row plus one document entry, both
/// stamped with the invocation environment.
pub async fn add(
    config: &Config,
    store: &RegrStore,
    project: &str,
    module: &str,
    regr_type: &str,
) -> Result<()> {
    let project_id = store.require_project_id(project).await?;
    let module_id = store.require_module_id(project_id, module).await?;

    let inv = Invocation::capture();
    let regr_id = store
        .add_regr(&NewRegr {
            module_id,
            regr_type: regr_type.to_string(),
            current_dir: inv.dir.to_string_lossy().into_owned(),
            created_by: inv.user.clone(),
            created_host: inv.host.clone(),
        })
        .await?;

    let _lock = super::lock_state(config)?;
    let mut doc = RegrDoc::load(&config.state_file)?;
    doc.add_regr(RegrEntry::new(regr_id, regr_type, module, Some(module_id), &inv));
    doc.save(&config.state_file)?;

    info!(regr_id, module, "regression registered");
    println!("registered regression {regr_id} for module {module}");
    Ok(())
}

/// Record submission details on the most recently created regression.
#[allow(clippy::too_many_arguments)]
pub async fn set_slurm(
    config: &Config,
    store: &RegrStore,
    part_name: &str,
    part_mode: &str,
    node_name: &str,
    work_name: &str,
    work_url: &str,
    case_list: &str,
) -> Result<()> {
    // Fail early on an unknown topology rather than at attach time.
    config
        .nodes_for(part_name, part_mode, node_name)
        .context("invalid partition/node selection")?;

    let _lock = super::lock_state(config)?;
    let mut doc = RegrDoc::load(&config.state_file)?;
    let regr = doc.last_regr_mut()?;
    let regr_id = regr.regr_id;

    if store.find_regr(regr_id).await?.is_none() {
        anyhow::bail!("regression {regr_id} from the state file no longer exists in the database");
    }

    regr.update_slurm_info(part_name, part_mode, node_name, work_name, work_url, case_list);
    store
        .update_slurm_info(regr_id, part_name, part_mode, node_name, work_name, work_url, case_list)
        .await?;
    doc.save(&config.state_file)?;

    println!("regression {regr_id}: submission info recorded ({part_name}/{part_mode} on {node_name})");
    Ok(())
}

pub async fn list(store: &RegrStore, project: &str, module: &str) -> Result<()> {
    let project_id = store.require_project_id(project).await?;
    let module_id = store.require_module_id(project_id, module).await?;
    let regrs = store.list_regrs(Some(module_id)).await?;
    print!("{}", format::regr_table(&regrs));
    Ok(())
}

pub async fn delete(config: &Config, store: &RegrStore, regr_id: i64) -> Result<()> {
    let removed = store.delete_regr(regr_id).await?;
    if removed == 0 {
        anyhow::bail!("regression {regr_id} not found");
    }

    let _lock = super::lock_state(config)?;
    let mut doc = RegrDoc::load(&config.state_file)?;
    if doc.remove_regr(regr_id) {
        doc.save(&config.state_file)?;
    }

    println!("deleted regression {regr_id}");
    Ok(())
}
