// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Submission registration: turns the scheduler's status.log and the
//! generator's reg_info.log into sim records in the store and the state
//! document's unassigned pool. Also covers one-off sims launched by hand
//! outside any regression.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::artifacts::{self, SimSubmission};
use crate::check;
use crate::config::Config;
use crate::db::{NewSim, RegrStore};
use crate::env;
use crate::slurm::SchedulerProbe;
use crate::state::{self, RegrDoc, RegrEntry, SimEntry, SimStatus};

use super::classify;

const STATUS_LOG: &str = "status.log";
const REG_INFO_LOG: &str = "log/reg_info.log";

/// Register submitted sims for every regression in the state document.
/// Validation is all-or-nothing per regression: a malformed or
/// inconsistent artifact pair leaves the store untouched.
pub async fn add_basic(config: &Config, store: &RegrStore) -> Result<()> {
    let dir_name = super::cwd_basename()?;
    if dir_name != config.regr_dir_name && dir_name != "regr" {
        anyhow::bail!(
            "current directory {dir_name:?} is not a {} or regr directory",
            config.regr_dir_name
        );
    }

    let _lock = super::lock_state(config)?;
    let mut doc = RegrDoc::load(&config.state_file)?;
    if doc.regrs.is_empty() {
        anyhow::bail!("no regressions in the state document; run regr add first");
    }

    let mut total = 0usize;
    for regr in doc.regrs.iter_mut() {
        total += register_regr(store, regr, Path::new(STATUS_LOG), Path::new(REG_INFO_LOG)).await?;
    }
    doc.save(&config.state_file)?;
    println!("registered {total} sim(s)");
    Ok(())
}

async fn register_regr(
    store: &RegrStore,
    regr: &mut RegrEntry,
    status_log: &Path,
    reg_info_log: &Path,
) -> Result<usize> {
    let case_list_raw = regr
        .case_list
        .as_deref()
        .with_context(|| format!("regression {} has no case list; run set-slurm first", regr.regr_id))?;
    let case_list = artifacts::parse_case_list(case_list_raw);

    let jobs = artifacts::parse_status_log(status_log)?;
    let seeds = artifacts::parse_reg_info_log(reg_info_log)?;
    let submissions = artifacts::merge_registration(&jobs, &seeds, &case_list)?;

    if !store.exist_regr(regr.regr_id).await? {
        anyhow::bail!("regression {} is missing from the store", regr.regr_id);
    }
    let module_id = regr
        .module_id
        .with_context(|| format!("regression {} carries no module id", regr.regr_id))?;

    // Re-registration replaces the previous submission wholesale.
    if !regr.sims.is_empty() {
        warn!(regr_id = regr.regr_id, dropped = regr.sims.len(), "replacing previously registered sims");
    }
    regr.clear_sims();

    let mut count = 0usize;
    for sub in &submissions {
        let case_id = resolve_case_id(store, module_id, &sub.case_name, &regr.current_user).await?;
        let sim_id = store
            .add_sim(&NewSim {
                regr_id: Some(regr.regr_id),
                case_id,
                task_id: None,
                case_seed: sub.case_seed.clone(),
                job_id: sub.job_id,
                sim_log: None,
                created_by: regr.current_user.clone(),
            })
            .await?;
        regr.add_sim(new_entry(sim_id, sub));
        count += 1;
    }
    info!(regr_id = regr.regr_id, count, "sims registered");
    Ok(count)
}

/// Register a hand-launched sim into the current task and check it right
/// away. The case name and seed come from the simulator command line the
/// log opens with; there is no scheduler job, so the elapsed time is the
/// operator-supplied value.
pub async fn add_single(
    config: &Config,
    store: &RegrStore,
    probe: &dyn SchedulerProbe,
    project: &str,
    module: &str,
    sim_log: &Path,
    sim_time: Option<i64>,
) -> Result<()> {
    let mut task = state::load_task(&config.task_file)?
        .context("no task document here; run task add first")?;
    let task_id = task
        .task_id
        .context("task document carries no task id; run task add first")?;

    let log_path = absolute_log_path(sim_log)?;
    if !log_path.is_file() {
        anyhow::bail!("sim log {} not found", log_path.display());
    }
    let (case_name, case_seed) = artifacts::parse_sim_header(&log_path)?;

    let project_id = store.require_project_id(project).await?;
    let module_id = store.require_module_id(project_id, module).await?;
    let user = env::current_user();
    let case_id = resolve_case_id(store, module_id, &case_name, &user).await?;

    let log_str = log_path.to_string_lossy().into_owned();
    if let Some(existing) = task
        .sim_logs
        .iter()
        .find(|s| s.key() == (case_name.as_str(), case_seed.as_str(), log_str.as_str()))
    {
        info!(sim_id = existing.sim_id, case = %case_name, seed = %case_seed, "sim log already registered, skipping");
        println!("sim {} already registered, nothing to do", existing.sim_id);
        return Ok(());
    }

    let sim_id = store
        .add_sim(&NewSim {
            regr_id: None,
            case_id,
            task_id: Some(task_id),
            case_seed: case_seed.clone(),
            job_id: 0,
            sim_log: Some(log_str.clone()),
            created_by: user,
        })
        .await?;

    let mut sim = SimEntry::new(sim_id, &case_name, &case_seed, 0);
    sim.sim_log = log_str;
    sim.advance(SimStatus::Todo);

    let exceptions = check::load_exceptions(config.exceptions_file.as_deref());
    let tolerance = task
        .corner_name
        .as_deref()
        .and_then(|corner| config.timing_tolerance.get(corner).copied())
        .unwrap_or(0);
    let post = task.status_post.is_true();
    let verdict =
        classify::check_sim(store, probe, &exceptions, tolerance, post, sim_time, &mut sim).await?;

    task.add_sim(sim);
    state::save_task(&config.task_file, &task)?;
    println!("registered single sim {sim_id} ({case_name} seed {case_seed}): {}", verdict.as_str());
    Ok(())
}

fn absolute_log_path(sim_log: &Path) -> Result<PathBuf> {
    if sim_log.is_absolute() {
        return Ok(sim_log.to_path_buf());
    }
    let cwd = std::env::current_dir().context("cannot resolve current directory")?;
    Ok(cwd.join(sim_log))
}

/// Cases named by a submission but absent from the catalog are
/// registered on the fly rather than aborting the whole run.
async fn resolve_case_id(
    store: &RegrStore,
    module_id: i64,
    case_name: &str,
    user: &str,
) -> Result<i64> {
    if let Some(id) = store.find_case_id(module_id, case_name).await? {
        return Ok(id);
    }
    warn!(case = case_name, "case not in catalog, registering it");
    Ok(store.add_case(module_id, case_name, user).await?)
}

fn new_entry(sim_id: i64, sub: &SimSubmission) -> SimEntry {
    SimEntry::new(sim_id, &sub.case_name, &sub.case_seed, sub.job_id)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::db::{NewTask, SimFilter};
    use crate::slurm::JobView;
    use crate::state::{CheckResult, TaskEntry};

    struct NoProbe;

    #[async_trait]
    impl SchedulerProbe for NoProbe {
        async fn job_state(&self, _job_id: i64) -> anyhow::Result<Option<JobView>> {
            Ok(None)
        }

        async fn job_elapsed_secs(&self, _job_id: i64) -> anyhow::Result<Option<u64>> {
            Ok(None)
        }
    }

    async fn seeded_store() -> (RegrStore, i64, i64) {
        let store = RegrStore::open_memory().await.unwrap();
        let project_id = store.add_project("soc", "tester").await.unwrap();
        let module_id = store.add_module(project_id, "uart", "tester").await.unwrap();
        let regr_id = store
            .add_regr(&crate::db::NewRegr {
                module_id,
                regr_type: "basic".into(),
                current_dir: "/work/tester/slurm".into(),
                created_by: "tester".into(),
                created_host: "eda".into(),
            })
            .await
            .unwrap();
        (store, module_id, regr_id)
    }

    fn write_artifacts(dir: &TempDir, status: &str, reg_info: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let status_path = dir.path().join("status.log");
        fs::write(&status_path, status).unwrap();
        fs::create_dir_all(dir.path().join("log")).unwrap();
        let reg_info_path = dir.path().join("log/reg_info.log");
        fs::write(&reg_info_path, reg_info).unwrap();
        (status_path, reg_info_path)
    }

    fn entry(regr_id: i64, module_id: i64) -> RegrEntry {
        let inv = crate::env::Invocation::capture();
        let mut regr = RegrEntry::new(regr_id, "basic", "uart", Some(module_id), &inv);
        regr.current_user = "tester".into();
        regr.case_list = Some("smoke,burst".into());
        regr
    }

    #[tokio::test]
    async fn registers_all_submissions() {
        let (store, module_id, regr_id) = seeded_store().await;
        store.add_case(module_id, "smoke", "tester").await.unwrap();
        store.add_case(module_id, "burst", "tester").await.unwrap();

        let dir = TempDir::new().unwrap();
        let (status, reg_info) = write_artifacts(
            &dir,
            "job 101 smoke\njob 102 burst\n",
            "smoke 7\nburst 9\n",
        );
        let mut regr = entry(regr_id, module_id);

        let count = register_regr(&store, &mut regr, &status, &reg_info).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(regr.sims.len(), 2);
        assert_eq!(regr.sims[0].status, SimStatus::Unset);
        assert_eq!(regr.sims[0].sim_log, "None");

        let sims = store
            .list_sims(&SimFilter { regr_id: Some(regr_id), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(sims.len(), 2);
        assert!(sims.iter().all(|s| s.task_id.is_none()));
    }

    #[tokio::test]
    async fn mismatched_artifacts_insert_nothing() {
        let (store, module_id, regr_id) = seeded_store().await;
        store.add_case(module_id, "smoke", "tester").await.unwrap();

        let dir = TempDir::new().unwrap();
        let (status, reg_info) =
            write_artifacts(&dir, "job 101 smoke\njob 102 smoke\n", "smoke 7\n");
        let mut regr = entry(regr_id, module_id);

        assert!(register_regr(&store, &mut regr, &status, &reg_info).await.is_err());
        let sims = store
            .list_sims(&SimFilter { regr_id: Some(regr_id), ..Default::default() })
            .await
            .unwrap();
        assert!(sims.is_empty());
    }

    fn single_config(dir: &TempDir) -> Config {
        let config_path = dir.path().join("vcm.toml");
        let task_file = dir.path().join("vcm_task_info.json");
        fs::write(
            &config_path,
            format!("task_file = {:?}\n", task_file.to_string_lossy()),
        )
        .unwrap();
        crate::config::load(Some(config_path), crate::config::Overrides::default()).unwrap()
    }

    async fn task_on_disk(store: &RegrStore, module_id: i64, config: &Config) -> i64 {
        let task_id = store
            .add_task(&NewTask {
                module_id,
                git_de: "abc".into(),
                git_dv: "def".into(),
                created_by: "tester".into(),
                created_host: "digit01".into(),
            })
            .await
            .unwrap();
        let mut task = TaskEntry::default();
        task.task_id = Some(task_id);
        state::save_task(&config.task_file, &task).unwrap();
        task_id
    }

    #[tokio::test]
    async fn single_sim_lands_in_task_with_verdict() {
        let (store, module_id, _regr_id) = seeded_store().await;
        store.add_case(module_id, "case_dma_burst", "tester").await.unwrap();

        let dir = TempDir::new().unwrap();
        let config = single_config(&dir);
        let task_id = task_on_disk(&store, module_id, &config).await;

        let log = dir.path().join("case_dma_burst_314.log");
        fs::write(&log, "xrun -R +UVM_TESTNAME=case_dma_burst +ntb_random_seed=314\nall quiet\n")
            .unwrap();

        add_single(&config, &store, &NoProbe, "soc", "uart", &log, Some(42)).await.unwrap();

        let sims = store
            .list_sims(&SimFilter { task_id: Some(task_id), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(sims.len(), 1);
        assert_eq!(sims[0].regr_id, None);
        assert_eq!(sims[0].job_id, 0);
        assert_eq!(sims[0].case_seed, "314");
        assert_eq!(sims[0].sim_time, Some(42));
        assert!(sims[0].is_check);
        assert_eq!(sims[0].is_pass, Some(true));

        let task = state::load_task(&config.task_file).unwrap().unwrap();
        assert_eq!(task.sim_logs.len(), 1);
        assert_eq!(task.sim_logs[0].status, SimStatus::CheckDone);
        assert_eq!(task.sim_logs[0].check_result, Some(CheckResult::Pass));
    }

    #[tokio::test]
    async fn single_sim_rerun_is_a_no_op() {
        let (store, module_id, _regr_id) = seeded_store().await;
        store.add_case(module_id, "case_dma_burst", "tester").await.unwrap();

        let dir = TempDir::new().unwrap();
        let config = single_config(&dir);
        let task_id = task_on_disk(&store, module_id, &config).await;

        let log = dir.path().join("case_dma_burst_314.log");
        fs::write(
            &log,
            "xrun -R +UVM_TESTNAME=case_dma_burst +ntb_random_seed=314\nUVM_ERROR bad read\n",
        )
        .unwrap();

        add_single(&config, &store, &NoProbe, "soc", "uart", &log, None).await.unwrap();
        add_single(&config, &store, &NoProbe, "soc", "uart", &log, None).await.unwrap();

        let sims = store
            .list_sims(&SimFilter { task_id: Some(task_id), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(sims.len(), 1);
        assert_eq!(sims[0].is_pass, Some(false));
        let task = state::load_task(&config.task_file).unwrap().unwrap();
        assert_eq!(task.sim_logs.len(), 1);
    }

    #[tokio::test]
    async fn unknown_case_is_registered_on_the_fly() {
        let (store, module_id, regr_id) = seeded_store().await;
        store.add_case(module_id, "smoke", "tester").await.unwrap();

        let dir = TempDir::new().unwrap();
        let (status, reg_info) =
            write_artifacts(&dir, "job 101 burst\njob 102 smoke\n", "burst 3\nsmoke 7\n");
        let mut regr = entry(regr_id, module_id);

        let count = register_regr(&store, &mut regr, &status, &reg_info).await.unwrap();
        assert_eq!(count, 2);
        assert!(store.find_case_id(module_id, "burst").await.unwrap().is_some());
    }
}
