// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Scheduler reconciliation: asks accounting where each pooled sim landed
//! and hands finished sims to the task owning that node.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::db::RegrStore;
use crate::slurm::{bucket_of, SchedulerProbe, StateBucket};
use crate::state::{RegrDoc, RegrEntry, SimEntry, SimStatus};

/// Reconcile every regression in the state document against scheduler
/// accounting. Sims stay in the unassigned pool until their job finished
/// AND the log is visible AND a task owns the node they ran on.
pub async fn run(config: &Config, store: &RegrStore, probe: &dyn SchedulerProbe) -> Result<()> {
    super::require_cwd_named(&config.regr_dir_name)?;

    let _lock = super::lock_state(config)?;
    let mut doc = RegrDoc::load(&config.state_file)?;
    if doc.regrs.is_empty() {
        anyhow::bail!("no regressions in the state document; nothing to reconcile");
    }

    let mut moved = 0usize;
    for regr in doc.regrs.iter_mut() {
        moved += reconcile_regr(config, store, probe, regr).await?;
    }
    doc.save(&config.state_file)?;
    println!("assigned {moved} sim(s) to tasks");
    Ok(())
}

async fn reconcile_regr(
    config: &Config,
    store: &RegrStore,
    probe: &dyn SchedulerProbe,
    regr: &mut RegrEntry,
) -> Result<usize> {
    let work_name = regr
        .work_name
        .clone()
        .with_context(|| format!("regression {} has no work_name; run set-slurm first", regr.regr_id))?;
    let user = regr.current_user.clone();

    let pool = std::mem::take(&mut regr.sims);
    let mut kept: Vec<SimEntry> = Vec::with_capacity(pool.len());
    let mut moved = 0usize;

    for mut sim in pool {
        if sim.job_id == 0 {
            warn!(sim_id = sim.sim_id, case = %sim.case_name, "sim has no job id, skipping");
            kept.push(sim);
            continue;
        }
        let Some(view) = probe.job_state(sim.job_id).await? else {
            warn!(job_id = sim.job_id, "scheduler has no record of job yet");
            kept.push(sim);
            continue;
        };
        sim.job_status = view.state.clone();

        match bucket_of(&view.state) {
            StateBucket::Pending => {
                sim.advance(SimStatus::Pending);
                kept.push(sim);
            }
            StateBucket::Running | StateBucket::Failed | StateBucket::Other => {
                kept.push(sim);
            }
            StateBucket::Completed => {
                let Some(node) = view.node else {
                    warn!(job_id = sim.job_id, "completed job reports no node");
                    kept.push(sim);
                    continue;
                };
                let Some(host_dir) = config.node_map.get(&node) else {
                    warn!(node = %node, "node is not in the node map");
                    kept.push(sim);
                    continue;
                };
                let log = sim_log_path(host_dir, &user, &work_name, &sim.case_name, &sim.case_seed);
                if !log.is_file() {
                    warn!(job_id = sim.job_id, log = %log.display(), "job finished but log is not visible yet");
                    kept.push(sim);
                    continue;
                }
                // Assignment needs an owning task on that node. Without
                // one the sim waits in the pool untouched.
                let Some(task) = regr
                    .tasks
                    .iter_mut()
                    .find(|t| t.task_id.is_some() && t.current_host == node)
                else {
                    warn!(node = %node, job_id = sim.job_id, "no task owns this node, sim stays pooled");
                    kept.push(sim);
                    continue;
                };
                let task_id = task.task_id.unwrap_or_default();

                sim.sim_log = log.to_string_lossy().into_owned();
                sim.advance(SimStatus::Todo);
                store.update_sim_task(sim.sim_id, task_id, &sim.sim_log).await?;
                info!(sim_id = sim.sim_id, task_id, node = %node, "sim assigned to task");
                task.add_sim(sim);
                moved += 1;
            }
        }
    }

    regr.sims = kept;
    Ok(moved)
}

/// Where a finished sim's log lives on the shared filesystem:
/// `/<host_dir>/work/<user>/<work>/regr/<case>/<case>_<seed>/<case>_<seed>.log`.
fn sim_log_path(host_dir: &str, user: &str, work_name: &str, case: &str, seed: &str) -> PathBuf {
    let run = format!("{case}_{seed}");
    PathBuf::from("/")
        .join(host_dir)
        .join("work")
        .join(user)
        .join(work_name)
        .join("regr")
        .join(case)
        .join(&run)
        .join(format!("{run}.log"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::config::{self, Overrides};
    use crate::db::{NewRegr, NewSim, NewTask, SimFilter};
    use crate::env::Invocation;
    use crate::slurm::JobView;
    use crate::state::TaskEntry;

    struct MockProbe {
        jobs: HashMap<i64, JobView>,
    }

    #[async_trait]
    impl SchedulerProbe for MockProbe {
        async fn job_state(&self, job_id: i64) -> anyhow::Result<Option<JobView>> {
            Ok(self.jobs.get(&job_id).cloned())
        }

        async fn job_elapsed_secs(&self, _job_id: i64) -> anyhow::Result<Option<u64>> {
            Ok(None)
        }
    }

    fn view(state: &str, node: Option<&str>) -> JobView {
        JobView {
            state: state.to_string(),
            node: node.map(str::to_string),
        }
    }

    /// Config whose single node "digit02" exports into `dir`, so composed
    /// log paths resolve inside the tempdir.
    fn test_config(dir: &TempDir) -> Config {
        let host_dir = dir
            .path()
            .to_string_lossy()
            .trim_start_matches('/')
            .to_string();
        let config_path = dir.path().join("vcm.toml");
        fs::write(
            &config_path,
            format!("[node_map]\ndigit02 = \"{host_dir}\"\n"),
        )
        .unwrap();
        config::load(Some(config_path), Overrides::default()).unwrap()
    }

    fn write_log(dir: &TempDir, user: &str, work: &str, case: &str, seed: &str) {
        let run = format!("{case}_{seed}");
        let log_dir = dir
            .path()
            .join("work")
            .join(user)
            .join(work)
            .join("regr")
            .join(case)
            .join(&run);
        fs::create_dir_all(&log_dir).unwrap();
        fs::write(log_dir.join(format!("{run}.log")), "UVM_INFO done\n").unwrap();
    }

    async fn seeded(store: &RegrStore) -> (i64, i64, i64) {
        let project_id = store.add_project("soc", "tester").await.unwrap();
        let module_id = store.add_module(project_id, "uart", "tester").await.unwrap();
        let regr_id = store
            .add_regr(&NewRegr {
                module_id,
                regr_type: "basic".into(),
                current_dir: "/work/tester/slurm".into(),
                created_by: "tester".into(),
                created_host: "eda".into(),
            })
            .await
            .unwrap();
        let case_id = store.add_case(module_id, "smoke", "tester").await.unwrap();
        (module_id, regr_id, case_id)
    }

    fn pooled_regr(regr_id: i64, module_id: i64, task_id: i64, node: &str) -> RegrEntry {
        let inv = Invocation::capture();
        let mut regr = RegrEntry::new(regr_id, "basic", "uart", Some(module_id), &inv);
        regr.current_user = "tester".into();
        regr.work_name = Some("nightly".into());
        let mut task = TaskEntry::default();
        task.task_id = Some(task_id);
        task.current_host = node.into();
        regr.add_task(task);
        regr
    }

    #[tokio::test]
    async fn completed_sim_moves_into_owning_task() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        write_log(&dir, "tester", "nightly", "smoke", "7");

        let store = RegrStore::open_memory().await.unwrap();
        let (module_id, regr_id, case_id) = seeded(&store).await;
        let task_id = store
            .add_task(&NewTask {
                module_id,
                git_de: "None".into(),
                git_dv: "None".into(),
                created_by: "tester".into(),
                created_host: "digit02".into(),
            })
            .await
            .unwrap();
        let sim_id = store
            .add_sim(&NewSim {
                regr_id: Some(regr_id),
                case_id,
                task_id: None,
                case_seed: "7".into(),
                job_id: 900,
                sim_log: None,
                created_by: "tester".into(),
            })
            .await
            .unwrap();

        let mut regr = pooled_regr(regr_id, module_id, task_id, "digit02");
        regr.add_sim(SimEntry::new(sim_id, "smoke", "7", 900));

        let probe = MockProbe {
            jobs: HashMap::from([(900, view("COMPLETED", Some("digit02")))]),
        };
        let moved = reconcile_regr(&config, &store, &probe, &mut regr).await.unwrap();

        assert_eq!(moved, 1);
        assert!(regr.sims.is_empty());
        let sim = &regr.tasks[0].sim_logs[0];
        assert_eq!(sim.status, SimStatus::Todo);
        assert!(Path::new(&sim.sim_log).is_file());

        let rows = store
            .list_sims(&SimFilter { regr_id: Some(regr_id), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(rows[0].task_id, Some(task_id));
        assert_eq!(rows[0].sim_log.as_deref(), Some(sim.sim_log.as_str()));
    }

    #[tokio::test]
    async fn unowned_node_leaves_sim_pooled_and_unchanged() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        write_log(&dir, "tester", "nightly", "smoke", "7");

        let store = RegrStore::open_memory().await.unwrap();
        let (module_id, regr_id, case_id) = seeded(&store).await;
        let sim_id = store
            .add_sim(&NewSim {
                regr_id: Some(regr_id),
                case_id,
                task_id: None,
                case_seed: "7".into(),
                job_id: 900,
                sim_log: None,
                created_by: "tester".into(),
            })
            .await
            .unwrap();

        // Task owns a different node than the one the job ran on.
        let mut regr = pooled_regr(regr_id, module_id, 1, "digit03");
        regr.add_sim(SimEntry::new(sim_id, "smoke", "7", 900));

        let probe = MockProbe {
            jobs: HashMap::from([(900, view("COMPLETED", Some("digit02")))]),
        };
        let moved = reconcile_regr(&config, &store, &probe, &mut regr).await.unwrap();

        assert_eq!(moved, 0);
        assert_eq!(regr.sims.len(), 1);
        assert_eq!(regr.sims[0].status, SimStatus::Unset);
        assert_eq!(regr.sims[0].job_status, "COMPLETED");
        assert!(regr.tasks[0].sim_logs.is_empty());
    }

    #[tokio::test]
    async fn pending_and_unknown_jobs_stay_pooled() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let store = RegrStore::open_memory().await.unwrap();
        let (module_id, regr_id, _case_id) = seeded(&store).await;

        let mut regr = pooled_regr(regr_id, module_id, 1, "digit02");
        regr.add_sim(SimEntry::new(1, "smoke", "1", 901));
        regr.add_sim(SimEntry::new(2, "smoke", "2", 902));
        regr.add_sim(SimEntry::new(3, "smoke", "3", 903));

        let probe = MockProbe {
            jobs: HashMap::from([
                (901, view("PENDING", None)),
                (902, view("RUNNING", Some("digit02"))),
            ]),
        };
        let moved = reconcile_regr(&config, &store, &probe, &mut regr).await.unwrap();

        assert_eq!(moved, 0);
        assert_eq!(regr.sims.len(), 3);
        assert_eq!(regr.sims[0].status, SimStatus::Pending);
        assert_eq!(regr.sims[1].status, SimStatus::Unset);
        assert_eq!(regr.sims[1].job_status, "RUNNING");
        // Job 903 is unknown to accounting; nothing recorded.
        assert_eq!(regr.sims[2].job_status, "None");
    }

    #[tokio::test]
    async fn completed_without_visible_log_waits() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let store = RegrStore::open_memory().await.unwrap();
        let (module_id, regr_id, _case_id) = seeded(&store).await;
        let mut regr = pooled_regr(regr_id, module_id, 1, "digit02");
        regr.add_sim(SimEntry::new(1, "smoke", "7", 900));

        let probe = MockProbe {
            jobs: HashMap::from([(900, view("COMPLETED", Some("digit02")))]),
        };
        let moved = reconcile_regr(&config, &store, &probe, &mut regr).await.unwrap();

        assert_eq!(moved, 0);
        assert_eq!(regr.sims.len(), 1);
        assert_eq!(regr.sims[0].job_status, "COMPLETED");
    }

    #[test]
    fn log_path_matches_node_layout() {
        let path = sim_log_path("home_d2", "verifier", "nightly", "smoke", "42");
        assert_eq!(
            path,
            PathBuf::from("/home_d2/work/verifier/nightly/regr/smoke/smoke_42/smoke_42.log")
        );
    }
}
