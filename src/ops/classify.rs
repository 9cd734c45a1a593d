// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Result classification: scan each assigned sim's log for functional
//! errors and timing violations, pull the runtime from accounting, and
//! persist the verdict.

use std::path::Path;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::check;
use crate::config::Config;
use crate::db::RegrStore;
use crate::slurm::SchedulerProbe;
use crate::state::{CheckResult, RegrDoc, RegrEntry, SimEntry, SimStatus};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckTotals {
    pub pass: usize,
    pub fail: usize,
    pub unknown: usize,
}

impl CheckTotals {
    fn absorb(&mut self, other: CheckTotals) {
        self.pass += other.pass;
        self.fail += other.fail;
        self.unknown += other.unknown;
    }
}

/// Classify every assigned sim across all regressions in the state
/// document. Sims whose logs cannot be read are marked unknown in the
/// document only; the store keeps no verdict for them.
pub async fn run(
    config: &Config,
    store: &RegrStore,
    probe: &dyn SchedulerProbe,
    sim_time_override: Option<i64>,
) -> Result<()> {
    super::require_cwd_named(&config.regr_dir_name)?;

    let exceptions = check::load_exceptions(config.exceptions_file.as_deref());

    let _lock = super::lock_state(config)?;
    let mut doc = RegrDoc::load(&config.state_file)?;
    if doc.regrs.is_empty() {
        anyhow::bail!("no regressions in the state document; nothing to check");
    }

    let mut totals = CheckTotals::default();
    for regr in doc.regrs.iter_mut() {
        totals.absorb(classify_regr(config, store, probe, regr, sim_time_override, &exceptions).await?);
    }
    doc.save(&config.state_file)?;
    println!(
        "checked: {} pass, {} fail, {} unknown",
        totals.pass, totals.fail, totals.unknown
    );
    Ok(())
}

async fn classify_regr(
    config: &Config,
    store: &RegrStore,
    probe: &dyn SchedulerProbe,
    regr: &mut RegrEntry,
    sim_time_override: Option<i64>,
    exceptions: &[String],
) -> Result<CheckTotals> {
    let mut totals = CheckTotals::default();

    for task in regr.tasks.iter_mut() {
        let post = task.status_post.is_true();
        let tolerance = task
            .corner_name
            .as_deref()
            .and_then(|corner| config.timing_tolerance.get(corner).copied())
            .unwrap_or(0);

        for sim in task.sim_logs.iter_mut() {
            // Re-running overwrites earlier verdicts, so a log that shows
            // up late still gets a real one.
            if !sim.status.is_ready_for_check() {
                continue;
            }
            match check_sim(store, probe, exceptions, tolerance, post, sim_time_override, sim)
                .await?
            {
                CheckResult::Pass => totals.pass += 1,
                CheckResult::Fail => totals.fail += 1,
                CheckResult::Unknown => totals.unknown += 1,
            }
        }
    }
    Ok(totals)
}

/// Check one assigned sim: count errors and timing violations, fetch the
/// elapsed time, persist the verdict. An unreadable log leaves the store
/// untouched and the document marked unknown.
pub(crate) async fn check_sim(
    store: &RegrStore,
    probe: &dyn SchedulerProbe,
    exceptions: &[String],
    tolerance: u64,
    post: bool,
    sim_time_override: Option<i64>,
    sim: &mut SimEntry,
) -> Result<CheckResult> {
    let fun = if sim.has_log() {
        check::count_function_errors(Path::new(&sim.sim_log), exceptions)
    } else {
        None
    };
    // Timing only counts against post-layout compiles; a pre-layout
    // netlist has no SDF to violate.
    let tim = if post {
        check::count_timing_violations(Path::new(&sim.sim_log))
            .map(|raw| check::effective_timing(raw, tolerance))
    } else {
        Some(0)
    };

    let (Some(fun), Some(tim)) = (fun, tim) else {
        warn!(sim_id = sim.sim_id, log = %sim.sim_log, "log unreadable, verdict unknown");
        sim.advance(SimStatus::CheckFail);
        sim.check_result = Some(CheckResult::Unknown);
        return Ok(CheckResult::Unknown);
    };

    let sim_time = if sim.job_id == 0 {
        sim_time_override.unwrap_or_else(|| {
            error!(sim_id = sim.sim_id, "sim has no job id and no --sim-time given");
            0
        })
    } else {
        match probe.job_elapsed_secs(sim.job_id).await? {
            Some(secs) => secs as i64,
            None => {
                warn!(job_id = sim.job_id, "no elapsed time on record");
                0
            }
        }
    };

    let pass = fun == 0 && tim == 0;
    sim.advance(SimStatus::CheckDone);
    sim.check_result = Some(if pass { CheckResult::Pass } else { CheckResult::Fail });
    store
        .update_sim_check(sim.sim_id, Some(sim_time), fun as i64, tim as i64, pass)
        .await?;
    info!(
        sim_id = sim.sim_id,
        case = %sim.case_name,
        errors = fun,
        timing = tim,
        pass,
        "sim checked"
    );
    Ok(if pass { CheckResult::Pass } else { CheckResult::Fail })
}
