// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::env::{self, Invocation};

/// Three-valued flag carried by task records. The wire strings are the
/// historical ones, so older documents keep loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    #[default]
    Unset,
    True,
    False,
}

impl TriState {
    pub fn as_str(self) -> &'static str {
        match self {
            TriState::Unset => "None",
            TriState::True => "True",
            TriState::False => "False",
        }
    }

    pub fn is_true(self) -> bool {
        matches!(self, TriState::True)
    }
}

impl From<&str> for TriState {
    fn from(raw: &str) -> Self {
        match raw {
            "True" => TriState::True,
            "False" => TriState::False,
            _ => TriState::Unset,
        }
    }
}

impl Serialize for TriState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TriState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TriState::from(raw.as_str()))
    }
}

/// Lifecycle of one simulation run. Transitions are strictly forward:
/// queued -> landed on a node -> ready for checking -> checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimStatus {
    #[default]
    Unset,
    Pending,
    Landed,
    Todo,
    CheckDone,
    CheckFail,
}

impl SimStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SimStatus::Unset => "None",
            SimStatus::Pending => "pending",
            SimStatus::Landed => "OK",
            SimStatus::Todo => "TODO",
            SimStatus::CheckDone => "CheckDone",
            SimStatus::CheckFail => "CheckFail",
        }
    }

    fn rank(self) -> u8 {
        match self {
            SimStatus::Unset => 0,
            SimStatus::Pending => 1,
            SimStatus::Landed => 2,
            SimStatus::Todo => 3,
            SimStatus::CheckDone | SimStatus::CheckFail => 4,
        }
    }

    /// True once the sim is at least ready for classification.
    pub fn is_ready_for_check(self) -> bool {
        self.rank() >= SimStatus::Todo.rank()
    }
}

impl From<&str> for SimStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "pending" | "PENDING" => SimStatus::Pending,
            "OK" => SimStatus::Landed,
            "TODO" => SimStatus::Todo,
            "CheckDone" => SimStatus::CheckDone,
            "CheckFail" => SimStatus::CheckFail,
            _ => SimStatus::Unset,
        }
    }
}

impl Serialize for SimStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SimStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(SimStatus::from(raw.as_str()))
    }
}

/// Outcome of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckResult {
    Pass,
    Fail,
    Unknown,
}

impl CheckResult {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckResult::Pass => "Pass",
            CheckResult::Fail => "Fail",
            CheckResult::Unknown => "Unknown",
        }
    }
}

/// One seeded simulation run, tracked from submission to classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEntry {
    pub sim_id: i64,
    pub case_name: String,
    pub case_seed: String,
    pub job_id: i64,
    /// Raw scheduler-reported state string for the owning job.
    #[serde(default = "none_string")]
    pub job_status: String,
    #[serde(default)]
    pub status: SimStatus,
    #[serde(default = "none_string")]
    pub sim_log: String,
    #[serde(default)]
    pub check_result: Option<CheckResult>,
    #[serde(default = "env::now_stamp")]
    pub created_time: String,
}

fn none_string() -> String {
    "None".into()
}

impl SimEntry {
    pub fn new(sim_id: i64, case_name: &str, case_seed: &str, job_id: i64) -> Self {
        Self {
            sim_id,
            case_name: case_name.into(),
            case_seed: case_seed.into(),
            job_id,
            job_status: none_string(),
            status: SimStatus::Unset,
            sim_log: none_string(),
            check_result: None,
            created_time: env::now_stamp(),
        }
    }

    /// Natural key: a sim is uniquely identified by case, seed, and log path.
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.case_name, &self.case_seed, &self.sim_log)
    }

    /// True if the sim has a known on-disk log.
    pub fn has_log(&self) -> bool {
        !self.sim_log.is_empty() && self.sim_log != "None"
    }

    /// Advance the lifecycle; moving backwards is refused.
    pub fn advance(&mut self, next: SimStatus) -> bool {
        if next.rank() < self.status.rank() {
            return false;
        }
        self.status = next;
        true
    }
}

/// One compile/elaboration context, normally bound to one compute node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEntry {
    #[serde(default)]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub status_post: TriState,
    #[serde(default)]
    pub status_regr: TriState,
    #[serde(default)]
    pub status_check: TriState,
    /// Timing corner detected from the compile log, when post applies.
    #[serde(default)]
    pub corner_name: Option<String>,
    #[serde(default = "none_string")]
    pub git_de: String,
    #[serde(default = "none_string")]
    pub git_dv: String,
    /// Compile-log modification time; part of the change-detection
    /// fingerprint together with user and host.
    #[serde(default)]
    pub comp_log_time: Option<String>,
    #[serde(default = "env::current_user")]
    pub current_user: String,
    #[serde(default = "env::current_host")]
    pub current_host: String,
    #[serde(default)]
    pub sim_logs: Vec<SimEntry>,
}

impl Default for TaskEntry {
    fn default() -> Self {
        Self {
            task_id: None,
            status_post: TriState::Unset,
            status_regr: TriState::Unset,
            status_check: TriState::Unset,
            corner_name: None,
            git_de: none_string(),
            git_dv: none_string(),
            comp_log_time: None,
            current_user: env::current_user(),
            current_host: env::current_host(),
            sim_logs: Vec::new(),
        }
    }
}

impl TaskEntry {
    /// Append a sim unless one with the same natural key (or the same
    /// sim_id / job_id) is already owned by this task. Duplicate adds are
    /// silent no-ops.
    pub fn add_sim(&mut self, sim: SimEntry) -> bool {
        let duplicate = self.sim_logs.iter().any(|s| {
            s.key() == sim.key() || s.sim_id == sim.sim_id || (sim.job_id != 0 && s.job_id == sim.job_id)
        });
        if duplicate {
            return false;
        }
        self.sim_logs.push(sim);
        true
    }

    /// Sims compiled against an old binary are invalid.
    pub fn clear_sims(&mut self) {
        self.sim_logs.clear();
    }
}

/// One batch submission of many simulation cases across compute nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegrEntry {
    pub regr_id: i64,
    pub regr_type: String,
    pub module_name: String,
    #[serde(default)]
    pub module_id: Option<i64>,
    pub current_dir: String,
    pub current_time: String,
    pub current_user: String,
    pub current_host: String,
    #[serde(default)]
    pub part_name: Option<String>,
    #[serde(default)]
    pub part_mode: Option<String>,
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub work_name: Option<String>,
    #[serde(default)]
    pub work_url: Option<String>,
    /// Comma-joined list of cases submitted with this regression.
    #[serde(default)]
    pub case_list: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
    /// Sims not yet assigned to a task (the unassigned pool).
    #[serde(default)]
    pub sims: Vec<SimEntry>,
}

impl RegrEntry {
    pub fn new(
        regr_id: i64,
        regr_type: &str,
        module_name: &str,
        module_id: Option<i64>,
        inv: &Invocation,
    ) -> Self {
        Self {
            regr_id,
            regr_type: regr_type.into(),
            module_name: module_name.into(),
            module_id,
            current_dir: inv.dir.to_string_lossy().into_owned(),
            current_time: inv.time.clone(),
            current_user: inv.user.clone(),
            current_host: inv.host.clone(),
            part_name: None,
            part_mode: None,
            node_name: None,
            work_name: None,
            work_url: None,
            case_list: None,
            tasks: Vec::new(),
            sims: Vec::new(),
        }
    }

    pub fn update_slurm_info(
        &mut self,
        part_name: &str,
        part_mode: &str,
        node_name: &str,
        work_name: &str,
        work_url: &str,
        case_list: &str,
    ) {
        self.part_name = Some(part_name.into());
        self.part_mode = Some(part_mode.into());
        self.node_name = Some(node_name.into());
        self.work_name = Some(work_name.into());
        self.work_url = Some(work_url.into());
        self.case_list = Some(case_list.into());
    }

    /// Append a task unless one with the same task_id already exists.
    pub fn add_task(&mut self, task: TaskEntry) -> bool {
        if task.task_id.is_some() && self.tasks.iter().any(|t| t.task_id == task.task_id) {
            return false;
        }
        self.tasks.push(task);
        true
    }

    pub fn clear_tasks(&mut self) {
        self.tasks.clear();
    }

    /// Append a sim to the unassigned pool unless its natural key is
    /// already present there.
    pub fn add_sim(&mut self, sim: SimEntry) -> bool {
        if self.sims.iter().any(|s| s.key() == sim.key()) {
            return false;
        }
        self.sims.push(sim);
        true
    }

    pub fn clear_sims(&mut self) {
        self.sims.clear();
    }
}
