// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Regression status rollup built from the state document alone. No
//! store or scheduler access; it reports whatever the last reconcile and
//! check left behind.

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::state::{CheckResult, RegrDoc, RegrEntry, SimEntry, SimStatus, TaskEntry};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub landed: usize,
    pub todo: usize,
    pub pass: usize,
    pub fail: usize,
    pub unknown: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.landed + self.todo + self.pass + self.fail + self.unknown
    }

    fn tally(&mut self, sim: &SimEntry) {
        match sim.status {
            SimStatus::Unset | SimStatus::Pending => self.pending += 1,
            SimStatus::Landed => self.landed += 1,
            SimStatus::Todo => self.todo += 1,
            SimStatus::CheckDone => match sim.check_result {
                Some(CheckResult::Pass) => self.pass += 1,
                Some(CheckResult::Fail) => self.fail += 1,
                _ => self.unknown += 1,
            },
            SimStatus::CheckFail => self.unknown += 1,
        }
    }

    fn absorb(&mut self, other: &StatusCounts) {
        self.pending += other.pending;
        self.landed += other.landed;
        self.todo += other.todo;
        self.pass += other.pass;
        self.fail += other.fail;
        self.unknown += other.unknown;
    }
}

/// One failing or unknown sim, listed for triage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailingSim {
    pub case_name: String,
    pub case_seed: String,
    pub sim_log: String,
    pub result: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task_id: Option<i64>,
    pub node: String,
    pub corner: Option<String>,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegrReport {
    pub regr_id: i64,
    pub regr_type: String,
    pub module_name: String,
    pub counts: StatusCounts,
    pub tasks: Vec<TaskReport>,
    pub failing: Vec<FailingSim>,
}

/// Print the rollup for every regression in the state document.
pub fn run(config: &Config, json: bool) -> Result<()> {
    let doc = RegrDoc::load(&config.state_file)?;
    if doc.regrs.is_empty() {
        anyhow::bail!("no regressions in the state document");
    }
    let reports: Vec<RegrReport> = doc.regrs.iter().map(build).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print!("{}", crate::format::report_text(&reports));
    }
    Ok(())
}

pub fn build(regr: &RegrEntry) -> RegrReport {
    let mut counts = StatusCounts::default();
    let mut failing = Vec::new();

    // Pooled sims count toward the regression but belong to no task yet.
    for sim in &regr.sims {
        counts.tally(sim);
        collect_failing(sim, &mut failing);
    }

    let tasks: Vec<TaskReport> = regr.tasks.iter().map(|t| build_task(t, &mut failing)).collect();
    for task in &tasks {
        counts.absorb(&task.counts);
    }

    RegrReport {
        regr_id: regr.regr_id,
        regr_type: regr.regr_type.clone(),
        module_name: regr.module_name.clone(),
        counts,
        tasks,
        failing,
    }
}

fn build_task(task: &TaskEntry, failing: &mut Vec<FailingSim>) -> TaskReport {
    let mut counts = StatusCounts::default();
    for sim in &task.sim_logs {
        counts.tally(sim);
        collect_failing(sim, failing);
    }
    TaskReport {
        task_id: task.task_id,
        node: task.current_host.clone(),
        corner: task.corner_name.clone(),
        counts,
    }
}

fn collect_failing(sim: &SimEntry, failing: &mut Vec<FailingSim>) {
    let result = match (sim.status, sim.check_result) {
        (SimStatus::CheckDone, Some(CheckResult::Fail)) => "Fail",
        (SimStatus::CheckFail, _) => "Unknown",
        _ => return,
    };
    failing.push(FailingSim {
        case_name: sim.case_name.clone(),
        case_seed: sim.case_seed.clone(),
        sim_log: sim.sim_log.clone(),
        result: result.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Invocation;

    fn sim(id: i64, status: SimStatus, result: Option<CheckResult>) -> SimEntry {
        let mut sim = SimEntry::new(id, &format!("case_{id}"), "7", 100 + id);
        sim.status = status;
        sim.check_result = result;
        sim
    }

    #[test]
    fn counts_cover_every_lifecycle_stage() {
        let inv = Invocation::capture();
        let mut regr = RegrEntry::new(1, "basic", "uart", Some(1), &inv);
        regr.add_sim(sim(1, SimStatus::Unset, None));
        regr.add_sim(sim(2, SimStatus::Pending, None));
        regr.add_sim(sim(3, SimStatus::Landed, None));

        let mut task = TaskEntry::default();
        task.task_id = Some(9);
        task.add_sim(sim(4, SimStatus::Todo, None));
        task.add_sim(sim(5, SimStatus::CheckDone, Some(CheckResult::Pass)));
        task.add_sim(sim(6, SimStatus::CheckDone, Some(CheckResult::Fail)));
        task.add_sim(sim(7, SimStatus::CheckFail, Some(CheckResult::Unknown)));
        regr.add_task(task);

        let report = build(&regr);
        assert_eq!(report.counts.pending, 2);
        assert_eq!(report.counts.landed, 1);
        assert_eq!(report.counts.todo, 1);
        assert_eq!(report.counts.pass, 1);
        assert_eq!(report.counts.fail, 1);
        assert_eq!(report.counts.unknown, 1);
        assert_eq!(report.counts.total(), 7);

        assert_eq!(report.tasks.len(), 1);
        assert_eq!(report.tasks[0].task_id, Some(9));
        assert_eq!(report.tasks[0].counts.total(), 4);
    }

    #[test]
    fn failing_list_names_fails_and_unknowns_only() {
        let inv = Invocation::capture();
        let mut regr = RegrEntry::new(1, "basic", "uart", None, &inv);
        let mut task = TaskEntry::default();
        task.task_id = Some(1);
        task.add_sim(sim(1, SimStatus::CheckDone, Some(CheckResult::Pass)));
        task.add_sim(sim(2, SimStatus::CheckDone, Some(CheckResult::Fail)));
        task.add_sim(sim(3, SimStatus::CheckFail, Some(CheckResult::Unknown)));
        task.add_sim(sim(4, SimStatus::Todo, None));
        regr.add_task(task);

        let report = build(&regr);
        assert_eq!(report.failing.len(), 2);
        assert_eq!(report.failing[0].case_name, "case_2");
        assert_eq!(report.failing[0].result, "Fail");
        assert_eq!(report.failing[1].result, "Unknown");
    }

    #[test]
    fn empty_regression_reports_zero() {
        let inv = Invocation::capture();
        let regr = RegrEntry::new(1, "basic", "uart", None, &inv);
        let report = build(&regr);
        assert_eq!(report.counts.total(), 0);
        assert!(report.tasks.is_empty());
        assert!(report.failing.is_empty());
    }
}
