// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the config file; defaults to the user config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Override the database path from config.
    #[arg(long, global = true)]
    pub database_path: Option<PathBuf>,
    /// Override the state document path from config.
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,
    /// Log at debug level instead of warn.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    Db(DbArgs),
    Project(ProjectArgs),
    Module(ModuleArgs),
    Case(CaseArgs),
    Regr(RegrArgs),
    Task(TaskArgs),
    Sim(SimArgs),
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum PartMode {
    Single,
    Multi,
}

impl PartMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PartMode::Single => "single",
            PartMode::Multi => "multi",
        }
    }
}

#[derive(Args, Debug)]
pub struct DbArgs {
    #[command(subcommand)]
    pub cmd: DbCmd,
}

#[derive(Subcommand, Debug)]
pub enum DbCmd {
    /// Create the database and its schema if missing.
    Init,
}

#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub cmd: ProjectCmd,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCmd {
    /// Register a project.
    Add { name: String },
    /// List projects.
    List,
}

#[derive(Args, Debug)]
pub struct ModuleArgs {
    #[command(subcommand)]
    pub cmd: ModuleCmd,
}

#[derive(Subcommand, Debug)]
pub enum ModuleCmd {
    /// Register a module under a project.
    Add { project: String, name: String },
    /// List a project's modules.
    List { project: String },
}

#[derive(Args, Debug)]
pub struct CaseArgs {
    #[command(subcommand)]
    pub cmd: CaseCmd,
}

#[derive(Subcommand, Debug)]
pub enum CaseCmd {
    /// Register a verification case under a module.
    Add {
        project: String,
        module: String,
        name: String,
    },
    /// List a module's cases.
    List { project: String, module: String },
    /// Flip a capability flag on a case.
    SetFlag {
        project: String,
        module: String,
        name: String,
        #[arg(value_enum)]
        flag: CaseFlagArg,
        value: bool,
    },
    /// Record the localized catalog names on a case.
    SetInfo {
        project: String,
        module: String,
        name: String,
        case_c_name: String,
        case_c_group: String,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum CaseFlagArg {
    Bt,
    St,
    Regr,
    Post,
    Ams,
}

impl CaseFlagArg {
    pub fn as_flag(self) -> crate::db::CaseFlag {
        match self {
            CaseFlagArg::Bt => crate::db::CaseFlag::Bt,
            CaseFlagArg::St => crate::db::CaseFlag::St,
            CaseFlagArg::Regr => crate::db::CaseFlag::Regr,
            CaseFlagArg::Post => crate::db::CaseFlag::Post,
            CaseFlagArg::Ams => crate::db::CaseFlag::Ams,
        }
    }
}

#[derive(Args, Debug)]
pub struct RegrArgs {
    #[command(subcommand)]
    pub cmd: RegrCmd,
}

#[derive(Subcommand, Debug)]
pub enum RegrCmd {
    /// Create a regression for a module.
    Add {
        project: String,
        module: String,
        #[arg(long, default_value = "basic")]
        regr_type: String,
    },
    /// Record submission details on the latest regression.
    SetSlurm(SetSlurmArgs),
    /// List a module's regressions.
    List { project: String, module: String },
    /// Delete a regression.
    Delete { regr_id: i64 },
    /// Status rollup from the state document.
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct SetSlurmArgs {
    /// Scheduler partition the regression was submitted to.
    pub part_name: String,
    #[arg(value_enum)]
    pub part_mode: PartMode,
    /// Node name; required for single mode, ignored for multi.
    #[arg(long, default_value = "")]
    pub node_name: String,
    /// Work directory name under each node's work area.
    #[arg(long)]
    pub work_name: String,
    /// Repository url the submission was built from.
    #[arg(long, default_value = "")]
    pub work_url: String,
    /// Comma-separated list of submitted cases.
    #[arg(long)]
    pub case_list: String,
}

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub cmd: TaskCmd,
}

#[derive(Subcommand, Debug)]
pub enum TaskCmd {
    /// Register the current compile context as a task.
    Add {
        project: String,
        module: String,
        #[arg(long, default_value = "None")]
        git_de: String,
        #[arg(long, default_value = "None")]
        git_dv: String,
    },
    /// Attach each node's task to the latest regression.
    Attach,
    /// List tasks attached to a regression.
    List { regr_id: i64 },
}

#[derive(Args, Debug)]
pub struct SimArgs {
    #[command(subcommand)]
    pub cmd: SimCmd,
}

#[derive(Subcommand, Debug)]
pub enum SimCmd {
    /// Register submitted sims from status.log and reg_info.log.
    AddRegr,
    /// Register one hand-launched sim into the current task and check it.
    AddSingle {
        project: String,
        module: String,
        /// Path to the sim log, relative to the current directory.
        sim_log: PathBuf,
        /// Elapsed seconds to record; there is no scheduler job to ask.
        #[arg(long)]
        sim_time: Option<i64>,
    },
    /// Ask scheduler accounting where each pooled sim landed.
    Reconcile,
    /// Classify assigned sims and persist verdicts.
    Check {
        /// Elapsed seconds to record for sims without a job id.
        #[arg(long)]
        sim_time: Option<i64>,
    },
    /// List sim records.
    List(ListSimsArgs),
}

#[derive(Args, Debug)]
pub struct ListSimsArgs {
    #[arg(long)]
    pub regr_id: Option<i64>,
    #[arg(long)]
    pub task_id: Option<i64>,
    #[arg(long)]
    pub case_id: Option<i64>,
    /// Only sims whose check came back failing.
    #[arg(long)]
    pub failed: bool,
    #[arg(long)]
    pub json: bool,
}
