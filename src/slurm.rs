// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Slurm accounting glue: sacct output parsing and the scheduler probe
//! used by reconciliation and checking.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::warn;

/// Fields pulled from sacct for one job: its state and the node it ran on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobView {
    pub state: String,
    pub node: Option<String>,
}

/// Coarse dispatch bucket for a normalized job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBucket {
    Pending,
    Running,
    Completed,
    Failed,
    Other,
}

pub fn bucket_of(state: &str) -> StateBucket {
    match normalize_slurm_state(state).as_str() {
        "PENDING" => StateBucket::Pending,
        "RUNNING" | "CONFIGURING" | "COMPLETING" | "PREEMPTED" => StateBucket::Running,
        "COMPLETED" => StateBucket::Completed,
        "FAILED" | "CANCELLED" | "TIMEOUT" | "NODE_FAIL" | "BOOT_FAIL" | "OUT_OF_MEMORY"
        | "DEADLINE" => StateBucket::Failed,
        _ => StateBucket::Other,
    }
}

/// Strip suffixes like "CANCELLED by 1234" or "REQUEUED+" down to the
/// bare state token, uppercased.
pub fn normalize_slurm_state(state: &str) -> String {
    let token = state
        .split(|c| c == '+' || c == ':' || c == '(' || c == ' ')
        .next()
        .unwrap_or(state)
        .trim();
    token.to_ascii_uppercase()
}

/// Parse the first accounting line of
/// `sacct --noheader --parsable2 --format=State,NodeList -j <id>`.
/// Subsequent lines are per-step records for the same job.
pub fn parse_sacct_job_view(output: &str) -> Option<JobView> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let mut fields = line.split('|');
    let state = fields.next()?.trim();
    if state.is_empty() {
        return None;
    }
    let node = fields
        .next()
        .map(str::trim)
        .filter(|n| !n.is_empty() && *n != "None assigned" && *n != "Unknown")
        .map(str::to_string);
    Some(JobView {
        state: state.to_string(),
        node,
    })
}

/// Parse an Elapsed value like "1-02:03:04", "02:03:04", "03:04", or "59"
/// into whole seconds.
pub fn parse_elapsed_secs(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (days, hms) = if let Some(dash) = s.find('-') {
        let (d, rest) = s.split_at(dash);
        let d: u64 = d.parse().ok()?;
        (d, &rest[1..])
    } else {
        (0, s)
    };

    let parts: Vec<&str> = hms.split(':').collect();
    let (h, m, sec): (u64, u64, u64) = match parts.as_slice() {
        [h, m, sec] => (h.parse().ok()?, m.parse().ok()?, sec.parse().ok()?),
        [m, sec] => (0, m.parse().ok()?, sec.parse().ok()?),
        [sec] => (0, 0, sec.parse().ok()?),
        _ => return None,
    };

    Some(
        days.saturating_mul(24 * 3600)
            .saturating_add(h * 3600)
            .saturating_add(m * 60)
            .saturating_add(sec),
    )
}

/// Accounting queries needed by reconciliation and checking. Both return
/// `Ok(None)` when the scheduler has nothing on record for the job.
#[async_trait]
pub trait SchedulerProbe: Send + Sync {
    async fn job_state(&self, job_id: i64) -> anyhow::Result<Option<JobView>>;
    async fn job_elapsed_secs(&self, job_id: i64) -> anyhow::Result<Option<u64>>;
}

/// Probe backed by the local `sacct` binary. Every invocation is bounded
/// by a timeout; a hung or failing sacct degrades to "no data" with a
/// warning instead of wedging the whole run.
pub struct Sacct {
    timeout: Duration,
}

impl Sacct {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run(&self, job_id: i64, format: &str) -> Option<String> {
        let mut cmd = Command::new("sacct");
        cmd.arg("--noheader")
            .arg("--parsable2")
            .arg(format!("--format={format}"))
            .arg("-j")
            .arg(job_id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let fut = cmd.output();
        let output = match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(job_id, error = %e, "failed to spawn sacct");
                return None;
            }
            Err(_) => {
                warn!(job_id, timeout_secs = self.timeout.as_secs(), "sacct timed out");
                return None;
            }
        };

        if !output.status.success() {
            warn!(job_id, status = %output.status, "sacct exited with failure");
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl SchedulerProbe for Sacct {
    async fn job_state(&self, job_id: i64) -> anyhow::Result<Option<JobView>> {
        Ok(self
            .run(job_id, "State,NodeList")
            .await
            .and_then(|out| parse_sacct_job_view(&out)))
    }

    async fn job_elapsed_secs(&self, job_id: i64) -> anyhow::Result<Option<u64>> {
        let Some(out) = self.run(job_id, "Elapsed").await else {
            return Ok(None);
        };
        Ok(out
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .and_then(parse_elapsed_secs))
    }
}
